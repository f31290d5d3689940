// FormatSelector - unified format selection logic
//
// Two directions:
// - raw format records from yt-dlp -> quality options and audio tracks
// - (height, language) chosen by the user -> yt-dlp selector expression

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use super::models::{AudioTrack, QualityOption};
use super::utils::base_language;

/// Format record as reported by `yt-dlp -j`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Video codec, "none" for audio-only
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec, "none" for video-only
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl RawFormat {
    /// Only an explicit "none" rules a stream out; a missing codec does not.
    fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }
}

/// How the selector expression is shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorStyle {
    /// Language-filtered branches first, then height-only fallbacks
    #[default]
    LanguageAware,
    /// Height cap only; for sources without alternate audio renditions
    HeightOnly,
}

impl SelectorStyle {
    /// YouTube exposes per-language audio; other sources get the plain chain
    pub fn for_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("youtube.com") || lower.contains("youtu.be") {
            Self::LanguageAware
        } else {
            Self::HeightOnly
        }
    }
}

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("pt", "Português"),
    ("pt-BR", "Português (Brasil)"),
    ("en", "English"),
    ("en-US", "English (US)"),
    ("es", "Español"),
    ("es-US", "Español (US)"),
    ("fr", "Français"),
    ("fr-FR", "Français"),
    ("de", "Deutsch"),
    ("de-DE", "Deutsch"),
    ("it", "Italiano"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("zh", "中文"),
    ("ru", "Русский"),
    ("ar", "العربية"),
    ("hi", "हिन्दी"),
    ("nl", "Nederlands"),
    ("pl", "Polski"),
    ("tr", "Türkçe"),
    ("sv", "Svenska"),
    ("id", "Bahasa Indonesia"),
    ("th", "ไทย"),
    ("vi", "Tiếng Việt"),
];

/// Format selector with quality/language detection
pub struct FormatSelector;

impl FormatSelector {
    /// Build the yt-dlp `-f` expression for the requested style.
    pub fn build(style: SelectorStyle, height: u32, language: Option<&str>) -> String {
        match style {
            SelectorStyle::LanguageAware => Self::build_selector(height, language),
            SelectorStyle::HeightOnly => Self::build_height_only(height),
        }
    }

    /// Build the language-aware fallback chain.
    ///
    /// Dedicated video+audio tracks filtered by language come first, then
    /// pre-muxed renditions filtered by language, then unfiltered
    /// combinations with an m4a preference. Every branch is capped at
    /// `height`.
    pub fn build_selector(height: u32, language: Option<&str>) -> String {
        let h = height;
        let tail = format!("bv[height<={h}]+ba[ext=m4a]/bv[height<={h}]+ba/b[height<={h}]");

        let code = match language.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => return tail,
        };

        let base = base_language(code);
        if base != code {
            format!(
                "bv[height<={h}]+ba[language={code}]/bv[height<={h}]+ba[language={base}]/\
                 b[language={code}][height<={h}]/b[language={base}][height<={h}]/{tail}"
            )
        } else {
            format!("bv[height<={h}]+ba[language={code}]/b[language={code}][height<={h}]/{tail}")
        }
    }

    /// Height-capped chain without language filters
    pub fn build_height_only(height: u32) -> String {
        format!("bv[height<={height}]+ba/b[height<={height}]/b")
    }

    /// Quality options: first record seen per height wins, sorted ascending.
    ///
    /// Audio-only records and records without a height are skipped.
    pub fn build_quality_options(formats: &[RawFormat]) -> Vec<QualityOption> {
        let mut seen = HashSet::new();
        let mut options: Vec<QualityOption> = formats
            .iter()
            .filter(|f| f.has_video())
            .filter_map(|f| f.height.filter(|h| *h > 0))
            .filter(|h| seen.insert(*h))
            .map(|height| QualityOption {
                height,
                label: format!("{}p", height),
            })
            .collect();

        options.sort_by_key(|o| o.height);
        options
    }

    /// Audio tracks: one per base language, represented by its longest code.
    ///
    /// Every record carrying audio counts, including pre-muxed renditions.
    pub fn build_audio_tracks(formats: &[RawFormat]) -> Vec<AudioTrack> {
        let mut by_base: HashMap<String, String> = HashMap::new();

        for f in formats.iter().filter(|f| f.has_audio()) {
            let code = match f.language.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => code,
                _ => continue,
            };
            let base = base_language(code).to_string();
            match by_base.get(&base) {
                Some(existing) if existing.len() >= code.len() => {}
                _ => {
                    by_base.insert(base, code.to_string());
                }
            }
        }

        let mut tracks: Vec<AudioTrack> = by_base
            .into_values()
            .map(|code| AudioTrack {
                display_name: Self::language_name(&code),
                code,
            })
            .collect();

        tracks.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.code.cmp(&b.code))
        });
        tracks
    }

    /// Display name for a language code: exact, then base, then the code
    pub fn language_name(code: &str) -> String {
        let lookup = |key: &str| {
            LANGUAGE_NAMES
                .iter()
                .find(|(c, _)| *c == key)
                .map(|(_, name)| name.to_string())
        };
        lookup(code)
            .or_else(|| lookup(base_language(code)))
            .unwrap_or_else(|| code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(height: u32, id: &str) -> RawFormat {
        RawFormat {
            format_id: Some(id.to_string()),
            height: Some(height),
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            language: None,
        }
    }

    fn audio(lang: &str) -> RawFormat {
        RawFormat {
            format_id: Some(format!("audio-{}", lang)),
            height: None,
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            language: Some(lang.to_string()),
        }
    }

    fn branches(selector: &str) -> Vec<&str> {
        selector.split('/').collect()
    }

    #[test]
    fn test_selector_without_language() {
        let s = FormatSelector::build_selector(720, None);
        assert_eq!(s, "bv[height<=720]+ba[ext=m4a]/bv[height<=720]+ba/b[height<=720]");
        assert_eq!(branches(&s).len(), 3);
        assert!(s.ends_with("/b[height<=720]"));
    }

    #[test]
    fn test_selector_empty_language_means_no_preference() {
        assert_eq!(
            FormatSelector::build_selector(480, Some("")),
            FormatSelector::build_selector(480, None)
        );
    }

    #[test]
    fn test_selector_with_base_language() {
        let s = FormatSelector::build_selector(1080, Some("en"));
        assert_eq!(
            s,
            "bv[height<=1080]+ba[language=en]/b[language=en][height<=1080]/\
             bv[height<=1080]+ba[ext=m4a]/bv[height<=1080]+ba/b[height<=1080]"
        );
        assert_eq!(branches(&s).len(), 5);
    }

    #[test]
    fn test_selector_with_region_language() {
        let s = FormatSelector::build_selector(360, Some("pt-BR"));
        let parts = branches(&s);
        assert_eq!(parts[0], "bv[height<=360]+ba[language=pt-BR]");
        assert_eq!(parts[1], "bv[height<=360]+ba[language=pt]");
        assert_eq!(parts[2], "b[language=pt-BR][height<=360]");
        assert_eq!(parts[3], "b[language=pt][height<=360]");
        assert_eq!(parts[4], "bv[height<=360]+ba[ext=m4a]");
        assert_eq!(parts[5], "bv[height<=360]+ba");
        assert_eq!(parts[6], "b[height<=360]");
        assert_eq!(parts.len(), 7);
        for part in parts {
            assert!(part.contains("height<=360"));
        }
    }

    #[test]
    fn test_height_only_selector() {
        assert_eq!(
            FormatSelector::build_height_only(720),
            "bv[height<=720]+ba/b[height<=720]/b"
        );
        assert_eq!(
            FormatSelector::build(SelectorStyle::HeightOnly, 720, Some("en")),
            "bv[height<=720]+ba/b[height<=720]/b"
        );
    }

    #[test]
    fn test_style_for_url() {
        assert_eq!(
            SelectorStyle::for_url("https://www.YouTube.com/watch?v=abc"),
            SelectorStyle::LanguageAware
        );
        assert_eq!(SelectorStyle::for_url("https://youtu.be/abc"), SelectorStyle::LanguageAware);
        assert_eq!(
            SelectorStyle::for_url("https://www.facebook.com/watch/?v=1"),
            SelectorStyle::HeightOnly
        );
    }

    #[test]
    fn test_quality_options_first_seen_ascending() {
        let formats = vec![
            video(1080, "137"),
            video(360, "134"),
            video(720, "136"),
            video(1080, "248"),
            audio("en"),
            RawFormat {
                height: Some(0),
                ..video(0, "broken")
            },
        ];

        let options = FormatSelector::build_quality_options(&formats);
        let heights: Vec<u32> = options.iter().map(|o| o.height).collect();
        assert_eq!(heights, vec![360, 720, 1080]);
        assert_eq!(options[2].label, "1080p");
    }

    #[test]
    fn test_audio_tracks_keep_most_specific_code() {
        let formats = vec![audio("en"), audio("en-US"), audio("pt"), video(720, "136")];

        let tracks = FormatSelector::build_audio_tracks(&formats);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].code, "en-US");
        assert_eq!(tracks[0].display_name, "English (US)");
        assert_eq!(tracks[1].code, "pt");
        assert_eq!(tracks[1].display_name, "Português");
    }

    #[test]
    fn test_audio_tracks_include_muxed_renditions() {
        let muxed = RawFormat {
            format_id: Some("hls-fr".to_string()),
            height: Some(720),
            vcodec: Some("avc1".to_string()),
            acodec: Some("mp4a".to_string()),
            language: Some("fr".to_string()),
        };
        let silent = RawFormat {
            language: Some("de".to_string()),
            ..video(720, "136")
        };

        let tracks = FormatSelector::build_audio_tracks(&[muxed, silent]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].code, "fr");
    }

    #[test]
    fn test_records_without_codec_fields_count() {
        let formats = vec![
            RawFormat {
                height: Some(360),
                language: Some("fr".to_string()),
                ..RawFormat::default()
            },
            RawFormat {
                height: Some(720),
                language: Some("fr".to_string()),
                ..RawFormat::default()
            },
        ];

        let heights: Vec<u32> = FormatSelector::build_quality_options(&formats)
            .iter()
            .map(|o| o.height)
            .collect();
        assert_eq!(heights, vec![360, 720]);

        let tracks = FormatSelector::build_audio_tracks(&formats);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].code, "fr");
    }

    #[test]
    fn test_language_name_fallbacks() {
        assert_eq!(FormatSelector::language_name("pt-BR"), "Português (Brasil)");
        assert_eq!(FormatSelector::language_name("it-CH"), "Italiano");
        assert_eq!(FormatSelector::language_name("xx-YY"), "xx-YY");
    }
}
