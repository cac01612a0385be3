//! Textual metadata carried by tEXt, zTXt and iTXt chunks.

use crate::error::PngEncodeErrors;

/// A latin-1 keyword/text pair from a tEXt or zTXt chunk.
///
/// Whether the pair is written back compressed is an encoder option,
/// not a property of the data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextChunk
{
    pub keyword: String,
    pub text:    String
}

/// An international text entry from an iTXt chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItxtChunk
{
    /// Latin-1 keyword, same rules as [`TextChunk`].
    pub keyword: String,
    /// RFC 3066 style language tag, possibly empty.
    pub language_tag: String,
    /// Keyword translated to the language, UTF-8, possibly empty.
    pub translated_keyword: String,
    /// UTF-8 text.
    pub text: String
}

/// Decode latin-1 bytes; every byte maps to the code point of the
/// same value, so this never fails and is reversible.
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String
{
    bytes.iter().map(|b| char::from(*b)).collect()
}

/// Encode a string back to latin-1; code points above U+00FF have no
/// representation.
pub(crate) fn string_to_latin1(s: &str) -> Result<Vec<u8>, PngEncodeErrors>
{
    s.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| PngEncodeErrors::BadKeyword("text is not representable in latin-1"))
        })
        .collect()
}

/// Keyword rules shared by all three text chunks: 1 to 79 latin-1
/// characters, printable only, no leading, trailing or consecutive
/// spaces.
pub(crate) fn validate_keyword(keyword: &str) -> Result<(), PngEncodeErrors>
{
    let bytes = string_to_latin1(keyword)?;

    if bytes.is_empty()
    {
        return Err(PngEncodeErrors::BadKeyword("keyword is empty"));
    }
    if bytes.len() > 79
    {
        return Err(PngEncodeErrors::BadKeyword("keyword is longer than 79 bytes"));
    }
    if bytes.first() == Some(&b' ') || bytes.last() == Some(&b' ')
    {
        return Err(PngEncodeErrors::BadKeyword(
            "keyword has leading or trailing spaces"
        ));
    }
    if bytes.windows(2).any(|pair| pair == b"  ")
    {
        return Err(PngEncodeErrors::BadKeyword("keyword has consecutive spaces"));
    }
    if bytes
        .iter()
        .any(|b| !matches!(b, 32..=126 | 161..=255))
    {
        return Err(PngEncodeErrors::BadKeyword(
            "keyword contains non printable characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn latin1_is_reversible()
    {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = latin1_to_string(&bytes);

        assert_eq!(string_to_latin1(&text).unwrap(), bytes);
    }

    #[test]
    fn keyword_rules()
    {
        assert!(validate_keyword("Title").is_ok());
        assert!(validate_keyword("Software Name").is_ok());

        assert!(validate_keyword("").is_err());
        assert!(validate_keyword(&"x".repeat(80)).is_err());
        assert!(validate_keyword(" padded").is_err());
        assert!(validate_keyword("padded ").is_err());
        assert!(validate_keyword("two  spaces").is_err());
        assert!(validate_keyword("tab\there").is_err());
        assert!(validate_keyword("snowman ☃").is_err());
    }
}
