use crate::error::AppError;

pub const NO_EXTRA_REQUIREMENTS: &str = "No extra requirements.";

// Fixed skeleton sent to every provider. The downstream models are sensitive
// to the section ordering and literal markup, so the text is substituted
// as-is and never reflowed.
const META_PROMPT_TEMPLATE: &str = r#"You are an Expert AI Prompt Engineer specializing in generating highly effective prompts for coding and development tasks.

Your task is to create a detailed, structured prompt that I can use with any AI model to solve the following problem:

**PROJECT IDEA:**
{project_idea}

**REQUIREMENTS:**
{requirements}

Please follow this exact structure for the output prompt:

---
**Role:** [Describe the expert role, e.g., "Senior Full-Stack Developer with 10+ years of experience in React and Node.js"]
**Context:** [Briefly explain the project, tech stack, and constraints]
**Task Instructions:**
1. [Step 1]
2. [Step 2]
...
**Constraints:**
- Must include [specific requirement 1]
- Must avoid [specific restriction 1]
...
**Output Format:**
- Provide complete, runnable code blocks.
- Include error handling.
- Add comments explaining key sections.
- Do NOT use placeholders like "// ...".
---
"#;

#[derive(Debug, Clone)]
pub struct PromptRequest {
    project_idea: String,
    requirements: String,
}

impl PromptRequest {
    pub fn new(project_idea: &str, requirements: Option<&str>) -> Result<Self, AppError> {
        if project_idea.trim().is_empty() {
            return Err(AppError::Validation(
                "project_idea must not be empty".to_string(),
            ));
        }

        let requirements = requirements
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(NO_EXTRA_REQUIREMENTS)
            .to_string();

        Ok(Self {
            project_idea: project_idea.to_string(),
            requirements,
        })
    }

    pub fn render(&self) -> String {
        META_PROMPT_TEMPLATE
            .replace("{project_idea}", &self.project_idea)
            .replace("{requirements}", &self.requirements)
    }
}
