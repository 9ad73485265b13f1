//! Prompt construction for the generation service.
//!
//! Both prompts demand a JSON object with an exact structure so the
//! extractor has a fighting chance; the model still wraps it in prose often
//! enough that extraction stays tolerant.

/// Language the model must answer in. Unknown codes fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLanguage {
    #[default]
    English,
    Hindi,
    Gujarati,
}

impl OutputLanguage {
    pub fn from_code(code: &str) -> Self {
        match code {
            "hi" => Self::Hindi,
            "gu" => Self::Gujarati,
            _ => Self::English,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Gujarati => "Gujarati",
        }
    }
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Advisory prompt: crop/location/season context with blanks defaulted, and
/// the required five-section advice structure with 0-based section keys.
pub fn advisory_prompt(crop: &str, location: &str, season: &str, lang: OutputLanguage) -> String {
    let lang = lang.name();
    format!(
        r#"You are an expert agricultural advisor. Provide farming advice in {lang} language for:
Crop: {crop}
Location: {location}
Season: {season}

IMPORTANT: Provide the ENTIRE response in {lang} language, including all headings, labels, and content.

Format your response as JSON with this EXACT structure:
{{
  "diagnosis": "Brief summary in {lang}",
  "advice": {{
    "0_best_practices": {{
      "title": "Title in {lang}",
      "details": "Details in {lang}"
    }},
    "1_common_challenges": {{
      "title": "Title in {lang}",
      "details": "Details in {lang}"
    }},
    "2_recommended_fertilizers": {{
      "title": "Title in {lang}",
      "details": "Details in {lang}"
    }},
    "3_irrigation_management": {{
      "title": "Title in {lang}",
      "details": "Details in {lang}"
    }},
    "4_harvesting_guidance": {{
      "title": "Title in {lang}",
      "details": "Details in {lang}"
    }}
  }}
}}

Remember: ALL text must be in {lang}, and use 0-based indexing (start from 0, not 1)."#,
        crop = or_default(crop, "general farming"),
        location = or_default(location, "not specified"),
        season = or_default(season, "current season"),
    )
}

/// Diagnosis prompt: accompanies an inline crop image.
pub fn diagnosis_prompt(lang: OutputLanguage) -> String {
    let lang = lang.name();
    format!(
        r#"You are an expert agricultural AI assistant specializing in crop disease diagnosis.
Analyze this image of a crop/plant and provide your ENTIRE response in {lang} language.

CRITICAL: Every single word, label, heading, and piece of content MUST be in {lang} language.

1. Diagnosis: Identify any diseases, pests, or health issues visible in the image (in {lang})
2. Confidence: Rate your confidence level (0-100%) as a number
3. Advice: Provide actionable treatment recommendations and preventive measures (in {lang})

Format your response as JSON with the following structure:
{{
  "diagnosis": "detailed diagnosis written entirely in {lang}",
  "confidence": 85,
  "advice": "detailed advice and recommendations written entirely in {lang}"
}}

DO NOT include any English words in the diagnosis or advice fields."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_code_defaults_to_english() {
        assert_eq!(OutputLanguage::from_code("hi"), OutputLanguage::Hindi);
        assert_eq!(OutputLanguage::from_code("gu"), OutputLanguage::Gujarati);
        assert_eq!(OutputLanguage::from_code("en"), OutputLanguage::English);
        assert_eq!(OutputLanguage::from_code("xx"), OutputLanguage::English);
    }

    #[test]
    fn advisory_prompt_defaults_blank_context() {
        let prompt = advisory_prompt("", "  ", "", OutputLanguage::English);
        assert!(prompt.contains("Crop: general farming"));
        assert!(prompt.contains("Location: not specified"));
        assert!(prompt.contains("Season: current season"));
        assert!(prompt.contains("0_best_practices"));
        assert!(prompt.contains("4_harvesting_guidance"));
    }

    #[test]
    fn advisory_prompt_embeds_user_context_and_language() {
        let prompt = advisory_prompt("wheat", "Punjab", "rabi", OutputLanguage::Hindi);
        assert!(prompt.contains("Crop: wheat"));
        assert!(prompt.contains("Location: Punjab"));
        assert!(prompt.contains("Season: rabi"));
        assert!(prompt.contains("in Hindi language"));
    }

    #[test]
    fn diagnosis_prompt_names_the_language() {
        let prompt = diagnosis_prompt(OutputLanguage::Gujarati);
        assert!(prompt.contains("Gujarati"));
        assert!(prompt.contains("\"confidence\": 85"));
    }
}
