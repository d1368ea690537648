//! Language detection with deterministic fallback to the primary language

use crate::error::DetectError;
use crate::language::Language;
use rayon::prelude::*;

/// Confidence when the classifier's code is a supported language
pub const EXACT_CONFIDENCE: f32 = 0.95;
/// Confidence when only the two-letter prefix matches a supported language
pub const PREFIX_CONFIDENCE: f32 = 0.85;
/// Confidence when the detected language is unsupported
pub const FALLBACK_CONFIDENCE: f32 = 0.50;

/// Statistical classifier returning a language code for a text
///
/// Implementations must be pure per call; the detector shares one instance
/// across its worker pool.
pub trait LanguageClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<String, DetectError>;
}

impl<F> LanguageClassifier for F
where
    F: Fn(&str) -> Result<String, DetectError> + Send + Sync,
{
    fn classify(&self, text: &str) -> Result<String, DetectError> {
        self(text)
    }
}

/// Trigram classifier backed by `whatlang`
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str) -> Result<String, DetectError> {
        let info = whatlang::detect(text).ok_or(DetectError::Undetermined)?;
        Ok(iso639_1(info.lang()).to_string())
    }
}

/// ISO 639-1 code for a whatlang language
///
/// whatlang reports 639-3 codes, whose first two letters often spell an
/// unrelated 639-1 code (`est` is Estonian, not Spanish).
fn iso639_1(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Epo => "eo",
        Lang::Eng => "en",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Ben => "bn",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ukr => "uk",
        Lang::Kat => "ka",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Heb => "he",
        Lang::Yid => "yi",
        Lang::Pol => "pl",
        Lang::Amh => "am",
        Lang::Jav => "jv",
        Lang::Kor => "ko",
        Lang::Nob => "nb",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Nld => "nl",
        Lang::Hun => "hu",
        Lang::Ces => "cs",
        Lang::Ell => "el",
        Lang::Bul => "bg",
        Lang::Bel => "be",
        Lang::Mar => "mr",
        Lang::Kan => "kn",
        Lang::Ron => "ro",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Mkd => "mk",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Est => "et",
        Lang::Tam => "ta",
        Lang::Vie => "vi",
        Lang::Urd => "ur",
        Lang::Tha => "th",
        Lang::Guj => "gu",
        Lang::Uzb => "uz",
        Lang::Pan => "pa",
        Lang::Aze => "az",
        Lang::Ind => "id",
        Lang::Tel => "te",
        Lang::Pes => "fa",
        Lang::Mal => "ml",
        Lang::Ori => "or",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Sin => "si",
        Lang::Khm => "km",
        Lang::Tuk => "tk",
        Lang::Aka => "ak",
        Lang::Zul => "zu",
        Lang::Sna => "sn",
        Lang::Afr => "af",
        Lang::Lat => "la",
        Lang::Slk => "sk",
        Lang::Cat => "ca",
        Lang::Tgl => "tl",
        Lang::Hye => "hy",
    }
}

pub struct LanguageDetector {
    classifier: Box<dyn LanguageClassifier>,
    supported: Vec<Language>,
    primary: Language,
    pool: Option<rayon::ThreadPool>,
}

impl LanguageDetector {
    pub fn new(supported: Vec<Language>, primary: Language) -> Self {
        Self::with_classifier(Box::new(WhatlangClassifier), supported, primary)
    }

    pub fn with_classifier(
        classifier: Box<dyn LanguageClassifier>,
        supported: Vec<Language>,
        primary: Language,
    ) -> Self {
        Self {
            classifier,
            supported,
            primary,
            pool: None,
        }
    }

    /// Run `detect_batch` on a fixed pool of `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Result<Self, DetectError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("lang-detect-{}", i))
            .build()
            .map_err(|e| DetectError::Pool(e.to_string()))?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn primary(&self) -> Language {
        self.primary
    }

    pub fn supported(&self) -> &[Language] {
        &self.supported
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn detect(&self, text: &str) -> (Language, f32) {
        if text.chars().filter(|c| !c.is_whitespace()).count() < 2 {
            return (self.primary, 0.0);
        }

        let code = match self.classifier.classify(text) {
            Ok(code) => code.to_lowercase(),
            Err(e) => {
                tracing::debug!("Language detection failed for {:?}: {}", text, e);
                return (self.primary, 0.0);
            }
        };

        if let Some(lang) = self.supported.iter().find(|l| l.code() == code) {
            return (*lang, EXACT_CONFIDENCE);
        }

        let prefix: String = code.chars().take(2).collect();
        if !prefix.is_empty() {
            if let Some(lang) = self.supported.iter().find(|l| l.code().starts_with(&prefix)) {
                return (*lang, PREFIX_CONFIDENCE);
            }
        }

        (self.primary, FALLBACK_CONFIDENCE)
    }

    /// Detect every text, preserving input order
    pub fn detect_batch(&self, texts: &[String]) -> Vec<(Language, f32)> {
        match &self.pool {
            Some(pool) => pool.install(|| texts.par_iter().map(|t| self.detect(t)).collect()),
            None => texts.iter().map(|t| self.detect(t)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> Vec<Language> {
        vec![Language::English, Language::Spanish, Language::German]
    }

    fn fixed(code: &'static str) -> Box<dyn LanguageClassifier> {
        Box::new(move |_: &str| -> Result<String, DetectError> { Ok(code.to_string()) })
    }

    #[test]
    fn test_short_input_uses_primary() {
        let detector = LanguageDetector::with_classifier(fixed("es"), supported(), Language::English);
        assert_eq!(detector.detect(""), (Language::English, 0.0));
        assert_eq!(detector.detect("a"), (Language::English, 0.0));
        assert_eq!(detector.detect("  x  "), (Language::English, 0.0));
    }

    #[test]
    fn test_exact_code() {
        let detector = LanguageDetector::with_classifier(fixed("es"), supported(), Language::English);
        assert_eq!(detector.detect("siguiente"), (Language::Spanish, EXACT_CONFIDENCE));
    }

    #[test]
    fn test_prefix_code() {
        let mut langs = supported();
        langs.push(Language::Chinese);
        let detector = LanguageDetector::with_classifier(fixed("zh-TW"), langs, Language::English);
        assert_eq!(detector.detect("下一张幻灯片"), (Language::Chinese, PREFIX_CONFIDENCE));
    }

    #[test]
    fn test_whatlang_codes_are_two_letter() {
        use whatlang::Lang;
        assert_eq!(iso639_1(Lang::Est), "et");
        assert_eq!(iso639_1(Lang::Jav), "jv");
        assert_eq!(iso639_1(Lang::Pes), "fa");
        assert!(Lang::all().iter().all(|l| iso639_1(*l).len() == 2));
    }

    #[test]
    fn test_whatlang_estonian_is_not_spanish() {
        let detector = LanguageDetector::new(supported(), Language::English);
        let (lang, conf) = detector.detect(
            "Tere, kuidas läheb? Ma olen täna väga õnnelik, sest ilm on ilus ja päike paistab.",
        );
        assert_eq!(lang, Language::English);
        assert_eq!(conf, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_unsupported_code_falls_back() {
        let detector = LanguageDetector::with_classifier(fixed("ru"), supported(), Language::English);
        assert_eq!(detector.detect("дальше"), (Language::English, FALLBACK_CONFIDENCE));
    }

    #[test]
    fn test_classifier_failure_falls_back() {
        let failing: Box<dyn LanguageClassifier> =
            Box::new(|_: &str| -> Result<String, DetectError> {
                Err(DetectError::Classifier("boom".into()))
            });
        let detector = LanguageDetector::with_classifier(failing, supported(), Language::German);
        assert_eq!(detector.detect("hello there"), (Language::German, 0.0));
    }

    #[test]
    fn test_whatlang_detects_long_english_sentence() {
        let detector = LanguageDetector::new(supported(), Language::German);
        let (lang, conf) =
            detector.detect("Please move on to the next slide of the presentation, thank you very much");
        assert_eq!(lang, Language::English);
        assert_eq!(conf, EXACT_CONFIDENCE);
    }

    #[test]
    fn test_batch_parallel_matches_sequential() {
        let texts: Vec<String> = [
            "Please move on to the next slide of the presentation",
            "Por favor, pasa a la siguiente diapositiva de la presentación",
            "Bitte gehe zur nächsten Folie der Präsentation weiter",
            "x",
            "",
            "Go back to the previous slide, the one with the chart",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let sequential = LanguageDetector::new(supported(), Language::English);
        let parallel = LanguageDetector::new(supported(), Language::English)
            .with_workers(4)
            .unwrap();
        assert!(parallel.is_parallel());

        let a = sequential.detect_batch(&texts);
        let b = parallel.detect_batch(&texts);
        assert_eq!(a.len(), texts.len());
        assert_eq!(a, b);
        assert_eq!(a[3], (Language::English, 0.0));
        assert_eq!(a[4], (Language::English, 0.0));
    }
}
