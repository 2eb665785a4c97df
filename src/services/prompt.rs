//! System and user prompts for the three completion flows.
//!
//! Every builder is pure: the same submission always yields the same pair, and
//! the submitted content is embedded verbatim.

use crate::db::models::{InputKind, RecentSubmission};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

const DEMO_CODE_SYSTEM: &str = "You are an expert programming tutor analyzing student code \
submissions. Provide constructive, educational feedback that helps students learn.";

const DEMO_EXPLANATION_SYSTEM: &str = "You are an expert educational tutor analyzing student \
explanations of programming concepts. Provide constructive feedback that helps students improve \
their understanding.";

const LEARNING_PATH_SYSTEM: &str = "You are an expert educational AI that creates personalized \
learning paths for programming students.
Based on the student's performance data, generate a comprehensive learning path with:
1. Current skill assessment (0-100)
2. 3-5 specific strengths
3. 3-5 areas for improvement
4. 3-5 recommended next topics in order of priority
5. A clear next milestone to achieve

Be specific, actionable, and encouraging.";

/// Prompt for the anonymous demo flow and for graded test answers.
pub fn demo_prompt(kind: InputKind, content: &str, language: Option<&str>) -> PromptPair {
    match kind {
        InputKind::Code => {
            let language = language.filter(|l| !l.trim().is_empty()).unwrap_or("programming");
            PromptPair {
                system: DEMO_CODE_SYSTEM.to_string(),
                user: format!(
                    "Analyze this {language} code and provide detailed feedback covering:\n\
                     1. Code correctness and functionality\n\
                     2. Best practices and code quality\n\
                     3. Efficiency and optimization opportunities\n\
                     4. Learning suggestions for improvement\n\n\
                     Code to analyze:\n```\n{content}\n```"
                ),
            }
        }
        InputKind::Explanation => PromptPair {
            system: DEMO_EXPLANATION_SYSTEM.to_string(),
            user: format!(
                "Analyze this student's explanation and provide detailed feedback covering:\n\
                 1. Conceptual accuracy and understanding\n\
                 2. Clarity and completeness of explanation\n\
                 3. Any misconceptions or gaps in knowledge\n\
                 4. Suggestions for deeper learning\n\n\
                 Student's explanation:\n\"{content}\""
            ),
        },
    }
}

/// Prompt for the authenticated flow, which asks for a clarity score the
/// heuristic can pick up.
pub fn analysis_prompt(kind: InputKind, content: &str, language: Option<&str>) -> PromptPair {
    let (subject, quality_line) = match kind {
        InputKind::Code => ("code", "3. Code Quality (efficiency, best practices, suggestions)\n"),
        InputKind::Explanation => ("explanation", ""),
    };
    let misconception_index = if quality_line.is_empty() { 3 } else { 4 };

    let system = format!(
        "You are AI-PAL, an adaptive learning assistant for programming education.\n\
         Your role is to analyze student submissions and provide personalized, educational \
         feedback without giving away complete solutions.\n\n\
         Analyze the student's {subject} and provide:\n\
         1. Clarity Analysis (score 0-100 and detailed analysis)\n\
         2. Conceptual Understanding (what they understand well and gaps to address)\n\
         {quality_line}\
         {misconception_index}. Misconception Detection (identify any incorrect understanding)\n\
         {hint_index}. Adaptive Hint (guide them toward the solution without revealing it)\n\
         {topic_index}. Suggested Next Topic (what they should study next)\n\n\
         Focus on being encouraging, educational, and progressive in your feedback.",
        hint_index = misconception_index + 1,
        topic_index = misconception_index + 2,
    );

    let user = match kind {
        InputKind::Code => match language.filter(|l| !l.trim().is_empty()) {
            Some(language) => format!("Programming Language: {language}\n\nCode:\n{content}"),
            None => format!("Code:\n{content}"),
        },
        InputKind::Explanation => format!("Explanation:\n{content}"),
    };

    PromptPair { system, user }
}

pub fn learning_path_prompt(
    topic: &str,
    skill_level: i32,
    recent: &[RecentSubmission],
) -> PromptPair {
    let performance = serde_json::to_string_pretty(recent).unwrap_or_else(|_| "[]".to_string());
    PromptPair {
        system: LEARNING_PATH_SYSTEM.to_string(),
        user: format!(
            "Create a personalized learning path for a student studying {topic}.\n\
             Current skill level: {skill_level}%\n\
             Recent performance: {performance}\n\n\
             Provide a structured response with strengths, areas for improvement, recommended \
             topics, and next milestone."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn demo_code_prompt_defaults_language() {
        let prompt = demo_prompt(InputKind::Code, "print(1)", None);
        assert!(prompt.user.starts_with("Analyze this programming code"));
        assert!(prompt.user.contains("```\nprint(1)\n```"));
    }

    #[test]
    fn demo_explanation_prompt_quotes_content() {
        let prompt = demo_prompt(InputKind::Explanation, "a loop repeats", Some("rust"));
        assert!(prompt.user.ends_with("\"a loop repeats\""));
        assert!(prompt.system.contains("explanations of programming concepts"));
    }

    #[test]
    fn analysis_prompt_numbers_stay_contiguous_without_quality_line() {
        let prompt = analysis_prompt(InputKind::Explanation, "x", None);
        assert!(!prompt.system.contains("Code Quality"));
        assert!(prompt.system.contains("3. Misconception Detection"));
        assert!(prompt.system.contains("5. Suggested Next Topic"));
        assert_eq!(prompt.user, "Explanation:\nx");
    }

    #[test]
    fn analysis_prompt_omits_missing_language() {
        let with = analysis_prompt(InputKind::Code, "def f(): pass", Some("Python"));
        assert_eq!(with.user, "Programming Language: Python\n\nCode:\ndef f(): pass");
        let without = analysis_prompt(InputKind::Code, "def f(): pass", None);
        assert_eq!(without.user, "Code:\ndef f(): pass");
        assert!(with.system.contains("4. Misconception Detection"));
    }

    #[test]
    fn learning_path_prompt_embeds_history() {
        let recent = vec![RecentSubmission {
            topic: Some("loops".to_string()),
            difficulty: Some("easy".to_string()),
            score: Some(70),
            analysis: None,
        }];
        let prompt = learning_path_prompt("loops", 40, &recent);
        assert!(prompt.user.contains("studying loops."));
        assert!(prompt.user.contains("Current skill level: 40%"));
        assert!(prompt.user.contains("\"score\": 70"));
    }

    proptest! {
        #[test]
        fn code_content_is_embedded_verbatim(
            content in "\\PC{1,200}",
            language in proptest::option::of("[A-Za-z+#]{1,12}"),
        ) {
            let demo = demo_prompt(InputKind::Code, &content, language.as_deref());
            prop_assert!(demo.user.contains(&content));
            let analysis = analysis_prompt(InputKind::Code, &content, language.as_deref());
            prop_assert!(analysis.user.contains(&content));
        }

        #[test]
        fn prompts_are_deterministic(content in "\\PC{1,80}") {
            prop_assert_eq!(
                demo_prompt(InputKind::Explanation, &content, None),
                demo_prompt(InputKind::Explanation, &content, None)
            );
        }
    }
}
