use crate::error::FlagError;

/// First symbol of the Unicode "Regional Indicator Symbol" block (🇦)
const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;

/// Convert a two letter ISO 3166 code into the regional indicator pair
/// that renders as the country flag.
///
/// Input is case insensitive. Anything other than exactly two ASCII letters
/// is rejected.
pub fn encode(country_code: &str) -> Result<String, FlagError> {
    let invalid = || FlagError::InvalidCountryCode(country_code.to_string());

    let letters: Vec<char> = country_code.chars().collect();
    if letters.len() != 2 || !letters.iter().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    letters
        .iter()
        .map(|c| {
            let offset = c.to_ascii_uppercase() as u32 - 'A' as u32;
            char::from_u32(REGIONAL_INDICATOR_A + offset).ok_or_else(invalid)
        })
        .collect()
}
