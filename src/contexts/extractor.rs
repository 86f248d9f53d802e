use tracing::warn;

/// The triple-backtick fence delimiter.
pub const FENCE: &str = "```";

/// Result of pulling code out of a free-form model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Content of the first fenced region.
    Fenced(String),
    /// No fence was present; the raw reply, which is probably not valid code.
    Unfenced(String),
}

impl Extraction {
    pub fn is_fenced(&self) -> bool {
        matches!(self, Extraction::Fenced(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Extraction::Fenced(code) | Extraction::Unfenced(code) => code,
        }
    }

    pub fn into_code(self) -> String {
        match self {
            Extraction::Fenced(code) | Extraction::Unfenced(code) => code,
        }
    }
}

/// Extracts source code from a raw model reply.
///
/// Returns the first fenced region with its language tag and a single leading
/// newline removed. Everything after the first region is discarded. Without
/// any fence the reply comes back unchanged as [`Extraction::Unfenced`] and a
/// warning is logged. Never fails.
pub fn extract(raw_text: &str) -> Extraction {
    let mut segments = raw_text.split(FENCE);
    let _before = segments.next();

    match segments.next() {
        Some(region) => Extraction::Fenced(strip_fence_header(region).to_string()),
        None => {
            warn!(
                "Generated response snippet doesn't contain ``` code block, highly likely to be incorrect"
            );
            Extraction::Unfenced(raw_text.to_string())
        }
    }
}

/// Removes the rest of the opening fence line when it is blank or holds only
/// a language tag. Trailing whitespace after the tag is ignored.
fn strip_fence_header(region: &str) -> &str {
    match region.split_once('\n') {
        Some((first_line, rest)) if first_line.trim().is_empty() || is_language_tag(first_line.trim()) => {
            rest
        }
        _ => region,
    }
}

fn is_language_tag(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.' | '#'))
}

/// Drops a language name that leaked onto the first line of an extracted body.
///
/// Models occasionally answer with "``` python" or put the language on its own
/// line inside the fence; neither is caught by the fence header rule.
pub fn strip_leaked_language_tag(code: &str) -> String {
    const LANGUAGE_NAMES: [&str; 3] = ["python", "python3", "py"];

    let trimmed = code.trim_start_matches(['\n', '\r']);
    let (first_line, rest) = match trimmed.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (trimmed, ""),
    };

    if LANGUAGE_NAMES
        .iter()
        .any(|name| first_line.trim().eq_ignore_ascii_case(name))
    {
        rest.to_string()
    } else {
        code.to_string()
    }
}
