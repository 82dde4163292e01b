//! Prompts for the résumé scoring step.
//!
//! Every prompt lives here so a wording change touches exactly one place
//! and unit tests can inspect prompts without calling an LLM. Callers can
//! override the system prompt via
//! [`crate::config::PipelineConfig::system_prompt`].

/// JSON shape the scorer must answer with.
///
/// Kept as a TypeScript-style interface because models follow that notation
/// more reliably than a JSON Schema document.
pub const FEEDBACK_FORMAT: &str = r#"interface Feedback {
  overallScore: number; // max 100
  ATS: {
    score: number; // rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; // give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string; // make it a short "title" for the actual explanation
      explanation: string; // explain in detail here
    }[]; // give 3-4 tips
  };
  content: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
  structure: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
  skills: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
}"#;

/// Default system prompt for the vision scorer.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert in ATS (Applicant Tracking System) and resume analysis.
You receive the pages of one resume as images, followed by the job the candidate is applying for.
Reply with a single JSON object and nothing else: no Markdown fences, no commentary."#;

/// Build the per-file instructions sent alongside the résumé.
///
/// Only the job title and description shape the analysis; the company name
/// is stored on the record but not shown to the model.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    format!(
        "You are an expert in ATS (Applicant Tracking System) and resume analysis.\n\
Please analyze and rate this resume and suggest how to improve it.\n\
The rating can be low if the resume is bad.\n\
Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.\n\
If there is a lot to improve, don't hesitate to give low scores. This is to help the user to improve their resume.\n\
If available, use the job description for the job user is applying to to give more detailed feedback.\n\
If provided, take the job description into consideration.\n\
The job title is: {job_title}\n\
The job description is: {job_description}\n\
Provide the feedback using the following format:\n\
{FEEDBACK_FORMAT}\n\
Return the analysis as a JSON object, without any other text and without the backticks.\n\
Do not include any other text or comments."
    )
}
