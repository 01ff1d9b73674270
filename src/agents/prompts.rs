//! Deterministic prompt construction for each agent role.
//!
//! Prompts are pure functions of their inputs; the orchestrator relies on
//! this for cache-key stability. Every prompt carries the
//! language-consistency instruction.

use crate::agents::{AdvocacyInput, ImprovementInput, SkepticismInput};

/// Instruction appended to every prompt so responses match the user's
/// language.
pub const LANGUAGE_CONSISTENCY_INSTRUCTION: &str =
    "IMPORTANT: Respond in the same language as the topic and context above. \
     If the input is in Japanese, respond entirely in Japanese.";

pub fn idea_generation_prompt(topic: &str, context: &str) -> String {
    format!(
        "You are a creative idea generator.\n\
         Topic: {topic}\n\
         Context and constraints: {context}\n\n\
         Generate a list of diverse, concrete ideas addressing the topic within \
         the given constraints. Each idea should be a self-contained proposal of \
         one to three sentences.\n\n\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}"
    )
}

pub fn evaluation_prompt(ideas: &[String], topic: &str, context: &str, re_evaluation: bool) -> String {
    let task = if re_evaluation {
        "You previously evaluated earlier versions of these ideas. Evaluate the \
         improved versions below on their own merits."
    } else {
        "Evaluate each idea below."
    };
    let joined = ideas.join("\n");
    format!(
        "You are a rigorous critic.\n\
         Topic: {topic}\n\
         Context and constraints: {context}\n\n\
         {task}\n\
         For each idea give an integer score from 0 to 10 and a short comment. \
         Return one evaluation per idea, in input order, with idea_index starting at 0.\n\n\
         Ideas:\n{joined}\n\n\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}"
    )
}

pub fn advocacy_batch_prompt(items: &[AdvocacyInput], context: &str) -> String {
    let mut body = String::new();
    for (index, item) in items.iter().enumerate() {
        body.push_str(&format!(
            "IDEA_{index}:\n{}\nEVALUATION:\n{}\n\n",
            item.idea, item.evaluation
        ));
    }
    format!(
        "You are a persuasive advocate. Context: {context}\n\n\
         For each idea below, argue its strengths, the opportunities it opens, \
         and how the evaluation's concerns can be addressed. Return one advocacy \
         per idea, in input order, with idea_index starting at 0.\n\n\
         {body}\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}"
    )
}

pub fn advocacy_single_prompt(item: &AdvocacyInput, context: &str) -> String {
    format!(
        "You are a persuasive advocate. Context: {context}\n\n\
         Argue the strengths of the idea below, the opportunities it opens, and \
         how the evaluation's concerns can be addressed.\n\n\
         IDEA:\n{}\nEVALUATION:\n{}\n\n\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}",
        item.idea, item.evaluation
    )
}

pub fn skepticism_batch_prompt(items: &[SkepticismInput], context: &str) -> String {
    let mut body = String::new();
    for (index, item) in items.iter().enumerate() {
        body.push_str(&format!(
            "IDEA_{index}:\n{}\nEVALUATION:\n{}\n\n",
            item.idea, item.evaluation
        ));
    }
    format!(
        "You are a devil's advocate. Context: {context}\n\n\
         For each idea below, identify critical flaws, risks and challenges, \
         questionable assumptions, and missing considerations the evaluation \
         may have glossed over. Return one critique per idea, in input order, \
         with idea_index starting at 0.\n\n\
         {body}\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}"
    )
}

pub fn skepticism_single_prompt(item: &SkepticismInput, context: &str) -> String {
    format!(
        "You are a devil's advocate. Context: {context}\n\n\
         Identify critical flaws, risks and challenges, questionable assumptions, \
         and missing considerations for the idea below that the evaluation may \
         have glossed over.\n\n\
         IDEA:\n{}\nEVALUATION:\n{}\n\n\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}",
        item.idea, item.evaluation
    )
}

pub fn improvement_batch_prompt(items: &[ImprovementInput], topic: &str, context: &str) -> String {
    let mut body = String::new();
    for (index, item) in items.iter().enumerate() {
        body.push_str(&format!(
            "IDEA_{index}:\n{}\nCRITIQUE:\n{}\nADVOCACY:\n{}\nSKEPTICISM:\n{}\n\n",
            item.idea, item.critique, item.advocacy, item.skepticism
        ));
    }
    format!(
        "You are a creative idea generator improving earlier proposals.\n\
         Topic: {topic}\n\
         Context and constraints: {context}\n\n\
         For each idea below, produce an improved version that preserves its core \
         strengths, addresses the critique and skepticism, and builds on the \
         advocacy. Return one improvement per idea, in input order, with \
         idea_index starting at 0.\n\n\
         {body}\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}"
    )
}

pub fn improvement_single_prompt(item: &ImprovementInput, topic: &str, context: &str) -> String {
    format!(
        "You are a creative idea generator improving an earlier proposal.\n\
         Topic: {topic}\n\
         Context and constraints: {context}\n\n\
         Produce an improved version of the idea below that preserves its core \
         strengths, addresses the critique and skepticism, and builds on the \
         advocacy.\n\n\
         IDEA:\n{}\nCRITIQUE:\n{}\nADVOCACY:\n{}\nSKEPTICISM:\n{}\n\n\
         {LANGUAGE_CONSISTENCY_INSTRUCTION}",
        item.idea, item.critique, item.advocacy, item.skepticism
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_deterministic() {
        let a = idea_generation_prompt("urban transport", "low budget");
        let b = idea_generation_prompt("urban transport", "low budget");
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompts_carry_language_instruction() {
        let ideas = vec!["idea one".to_string()];
        assert!(idea_generation_prompt("t", "c").contains(LANGUAGE_CONSISTENCY_INSTRUCTION));
        assert!(evaluation_prompt(&ideas, "t", "c", false)
            .contains(LANGUAGE_CONSISTENCY_INSTRUCTION));
        assert!(evaluation_prompt(&ideas, "t", "c", true)
            .contains(LANGUAGE_CONSISTENCY_INSTRUCTION));
    }

    #[test]
    fn test_batch_prompts_index_items() {
        let items = vec![
            AdvocacyInput {
                idea: "first".to_string(),
                evaluation: "good".to_string(),
            },
            AdvocacyInput {
                idea: "second".to_string(),
                evaluation: "better".to_string(),
            },
        ];
        let prompt = advocacy_batch_prompt(&items, "ctx");
        assert!(prompt.contains("IDEA_0:"));
        assert!(prompt.contains("IDEA_1:"));
    }

    #[test]
    fn test_reevaluation_prompt_differs_from_initial() {
        let ideas = vec!["idea".to_string()];
        let initial = evaluation_prompt(&ideas, "t", "c", false);
        let reeval = evaluation_prompt(&ideas, "t", "c", true);
        assert_ne!(initial, reeval);
    }
}
