//! The byte string a voting machine signs for each candidate vote total.

use types_rs::{CandidateVoteTotal, OfficeCode};

/// Substitute character written for text outside ISO-8859-1.
const SUBSTITUTE: u8 = 0x1a;

/// Encodes text as ISO-8859-1, one byte per character.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c).unwrap_or(SUBSTITUTE))
        .collect()
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

fn number_or_empty(number: u32) -> String {
    if number == 0 {
        String::new()
    } else {
        number.to_string()
    }
}

/// Builds the signed payload for a vote total: office code, vote kind,
/// count, candidate number, party number and charge code, concatenated
/// without separators. A candidate or party number of zero is written as
/// nothing.
pub fn canonical_payload(
    office: &OfficeCode,
    total: &CandidateVoteTotal,
    charge_code: &str,
) -> Vec<u8> {
    let (party, number) = total
        .candidate
        .map_or((0, 0), |candidate| (candidate.party, candidate.number));

    let text = format!(
        "{}{}{}{}{}{}",
        office.number(),
        total.kind.code(),
        total.count,
        number_or_empty(number),
        number_or_empty(party),
        charge_code,
    );

    encode_latin1(&text)
}
