//! Signature marker detection.
//!
//! Scans the text of an uploaded PDF for bracketed placement markers such as
//! `[SIGN_HERE]` or `[INITIAL_HERE_2]`, classifies them by field kind, and
//! estimates an on-page position for each.
//!
//! # Marker syntax
//!
//! `[KEYWORD]` or `[KEYWORD_N]` where the keyword is case-insensitive and `N`
//! is a positive 1-based signer index (default 1 when absent). Recognized
//! keywords: `SIGN_HERE`, `SIGNATURE_HERE`, `SIGN`, `INITIAL_HERE`,
//! `INITIALS_HERE`, `INITIAL`, `DATE_HERE`, `DATE`, `TEXT_HERE`, `TEXT`.
//! Unrecognized keywords inside brackets are not matched and stay literal
//! text. The syntax is stable; existing documents depend on it bit-exactly.
//!
//! # Position accuracy
//!
//! Plain text extraction discards true glyph coordinates, so positions are
//! estimated from the marker's offset within the page text (text assumed to
//! flow top-to-bottom) and within its own line. Placement is approximate,
//! not pixel-perfect; callers that need exact placement supply explicit
//! coordinates instead.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fields::FieldKind;
use crate::geometry::PageSize;
use crate::pdf;

lazy_static! {
    /// One compiled pattern recognizing every marker keyword, optionally
    /// suffixed with a positive signer index. Longer keywords are listed
    /// first so `SIGN_HERE` is not consumed as `SIGN`.
    static ref MARKER_PATTERN: Regex = Regex::new(
        r"(?i)\[(SIGNATURE_HERE|SIGN_HERE|SIGN|INITIALS_HERE|INITIAL_HERE|INITIAL|DATE_HERE|DATE|TEXT_HERE|TEXT)(?:_([1-9][0-9]*))?\]"
    )
    .unwrap();
}

/// A marker located in document text, with its estimated page position.
///
/// Coordinates are top-left origin in PDF points; `signer_index` is 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    /// Field kind derived from the marker keyword
    pub kind: FieldKind,
    /// The marker text exactly as matched, brackets included
    pub marker_text: String,
    /// 0-based signer index (`[SIGN_HERE_2]` → 1)
    pub signer_index: usize,
    /// 1-based page number the marker was found on
    pub page_number: u32,
    /// Estimated top-left x in points
    pub x: f64,
    /// Estimated top-left y in points
    pub y: f64,
    /// Default width for the field kind, in points
    pub width: f64,
    /// Default height for the field kind, in points
    pub height: f64,
}

/// One entry in a [`validate_for_signer_count`] report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementIssue {
    /// A signer has no `signature`-kind marker anywhere in the document.
    MissingSignature {
        /// 0-based index of the signer without a signature marker
        signer_index: usize,
    },
    /// A marker addresses a signer index beyond the envelope's signer count.
    SignerOutOfRange {
        /// The marker text as matched
        marker_text: String,
        /// 0-based signer index the marker addresses
        signer_index: usize,
        /// Number of signers on the envelope
        signer_count: usize,
    },
}

impl std::fmt::Display for PlacementIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementIssue::MissingSignature { signer_index } => {
                write!(f, "signer {} has no signature marker", signer_index + 1)
            }
            PlacementIssue::SignerOutOfRange {
                marker_text,
                signer_index,
                signer_count,
            } => write!(
                f,
                "marker {} addresses signer {} but the envelope has {} signer(s)",
                marker_text,
                signer_index + 1,
                signer_count
            ),
        }
    }
}

/// Detect every placement marker in a PDF.
///
/// Extracts text page by page and scans it with the marker pattern. A page
/// whose text cannot be extracted is skipped with a warning; a document that
/// cannot be parsed at all fails with [`crate::Error::DocumentParse`]. Zero
/// markers is an informational empty result, not an error; callers may fall
/// back to manual field placement.
pub fn detect_markers(pdf_bytes: &[u8]) -> Result<Vec<DetectedMarker>> {
    let doc = pdf::load_document(pdf_bytes)?;
    let mut markers = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let text = match doc.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("text extraction failed on page {page_number}: {e}");
                continue;
            }
        };
        let size = pdf::page_size(&doc, page_id);
        scan_page_text(&text, page_number, size, &mut markers);
    }
    log::debug!("detected {} marker(s)", markers.len());
    Ok(markers)
}

/// Scan one page's extracted text for markers, appending results to `out`.
fn scan_page_text(text: &str, page_number: u32, page: PageSize, out: &mut Vec<DetectedMarker>) {
    let total_chars = text.chars().count();
    for caps in MARKER_PATTERN.captures_iter(text) {
        let whole = caps.get(0).expect("match group 0 always present");
        let keyword = caps.get(1).expect("keyword group always present").as_str();
        let kind = classify_keyword(keyword);
        let signer_index = match caps.get(2) {
            Some(n) => match n.as_str().parse::<usize>() {
                Ok(n) => n - 1,
                Err(e) => {
                    log::warn!("ignoring marker {} with oversized index: {e}", whole.as_str());
                    continue;
                }
            },
            None => 0,
        };

        let (x, y) = estimate_position(text, whole.start(), total_chars, page);
        let (width, height) = kind.default_size();
        out.push(DetectedMarker {
            kind,
            marker_text: whole.as_str().to_string(),
            signer_index,
            page_number,
            x,
            y,
            width,
            height,
        });
    }
}

/// Fixed keyword → field kind table.
fn classify_keyword(keyword: &str) -> FieldKind {
    let upper = keyword.to_ascii_uppercase();
    match upper.as_str() {
        "SIGN_HERE" | "SIGNATURE_HERE" | "SIGN" => FieldKind::Signature,
        "INITIAL_HERE" | "INITIALS_HERE" | "INITIAL" => FieldKind::Initials,
        "DATE_HERE" | "DATE" => FieldKind::Date,
        _ => FieldKind::Text,
    }
}

/// Estimate a marker's top-left position from its character offset.
///
/// Vertical: `page_height * (1 − 0.8*char_ratio − 0.1)` where `char_ratio` is
/// the match offset over the page's total character count. Horizontal:
/// `page_width * (0.1 + 0.8*line_ratio)` where `line_ratio` is the offset
/// within the match's own line (0.5 when the line is empty).
fn estimate_position(
    text: &str,
    byte_offset: usize,
    total_chars: usize,
    page: PageSize,
) -> (f64, f64) {
    let char_offset = text[..byte_offset].chars().count();
    let char_ratio = if total_chars > 0 {
        char_offset as f64 / total_chars as f64
    } else {
        0.0
    };
    let y = page.height * (1.0 - 0.8 * char_ratio - 0.1);

    let line_start = text[..byte_offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[byte_offset..]
        .find('\n')
        .map(|i| byte_offset + i)
        .unwrap_or(text.len());
    let line_chars = text[line_start..line_end].chars().count();
    let line_ratio = if line_chars > 0 {
        text[line_start..byte_offset].chars().count() as f64 / line_chars as f64
    } else {
        0.5
    };
    let x = page.width * (0.1 + 0.8 * line_ratio);

    (x, y)
}

/// Group detected markers by 0-based signer index, ordered by index.
pub fn group_by_signer(markers: &[DetectedMarker]) -> BTreeMap<usize, Vec<&DetectedMarker>> {
    let mut groups: BTreeMap<usize, Vec<&DetectedMarker>> = BTreeMap::new();
    for marker in markers {
        groups.entry(marker.signer_index).or_default().push(marker);
    }
    groups
}

/// Report placement problems for an envelope with `signer_count` signers.
///
/// Returns one entry per signer lacking a signature-kind marker and one entry
/// per marker addressing a signer index at or beyond `signer_count`. This is
/// a reporting function only: it never fails; callers decide whether the
/// issues block envelope creation.
pub fn validate_for_signer_count(
    markers: &[DetectedMarker],
    signer_count: usize,
) -> Vec<PlacementIssue> {
    let mut issues = Vec::new();
    for signer_index in 0..signer_count {
        let has_signature = markers
            .iter()
            .any(|m| m.kind == FieldKind::Signature && m.signer_index == signer_index);
        if !has_signature {
            issues.push(PlacementIssue::MissingSignature { signer_index });
        }
    }
    for marker in markers {
        if marker.signer_index >= signer_count {
            issues.push(PlacementIssue::SignerOutOfRange {
                marker_text: marker.marker_text.clone(),
                signer_index: marker.signer_index,
                signer_count,
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scan(text: &str) -> Vec<DetectedMarker> {
        let mut out = Vec::new();
        scan_page_text(text, 1, PageSize::us_letter(), &mut out);
        out
    }

    #[test]
    fn test_sign_here_is_signature_for_first_signer() {
        let markers = scan("Please sign below\n[SIGN_HERE]\nThank you");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, FieldKind::Signature);
        assert_eq!(markers[0].signer_index, 0);
        assert_eq!(markers[0].marker_text, "[SIGN_HERE]");
        assert_eq!(markers[0].width, 200.0);
        assert_eq!(markers[0].height, 50.0);
    }

    #[test]
    fn test_indexed_initials_marker() {
        let markers = scan("[INITIAL_HERE_2]");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, FieldKind::Initials);
        assert_eq!(markers[0].signer_index, 1);
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let markers = scan("[sign_here] and [Date_3]");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].kind, FieldKind::Signature);
        assert_eq!(markers[1].kind, FieldKind::Date);
        assert_eq!(markers[1].signer_index, 2);
    }

    #[test]
    fn test_unrecognized_keyword_stays_literal() {
        assert!(scan("[STAMP_HERE] [SIGNED] [SIGN_THERE]").is_empty());
    }

    #[test]
    fn test_zero_index_suffix_does_not_match() {
        // N is a positive 1-based index; _0 leaves the bracket literal.
        assert!(scan("[SIGN_HERE_0]").is_empty());
    }

    #[test]
    fn test_all_keywords_classify() {
        let text = "[SIGN] [SIGNATURE_HERE] [INITIALS_HERE] [INITIAL] [DATE] [TEXT_HERE] [TEXT]";
        let kinds: Vec<FieldKind> = scan(text).iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Signature,
                FieldKind::Signature,
                FieldKind::Initials,
                FieldKind::Initials,
                FieldKind::Date,
                FieldKind::Text,
                FieldKind::Text,
            ]
        );
    }

    #[test]
    fn test_position_estimate_top_of_page() {
        // Marker at offset 0: char_ratio 0 puts it at 0.9 * page height,
        // line_ratio 0 puts it at 0.1 * page width.
        let markers = scan("[SIGN_HERE] trailing text to give the page some length");
        assert!((markers[0].y - 0.9 * 792.0).abs() < 1e-9);
        assert!((markers[0].x - 0.1 * 612.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_estimate_moves_down_with_offset() {
        let early = scan("[SIGN_HERE] padding padding padding padding");
        let late = scan("padding padding padding padding [SIGN_HERE]");
        assert!(late[0].y < early[0].y);
        assert!(late[0].x > early[0].x);
    }

    #[test]
    fn test_group_by_signer() {
        let markers = scan("[SIGN_HERE] [SIGN_HERE_2] [DATE_2] [TEXT_3]");
        let groups = group_by_signer(&markers);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&0].len(), 1);
        assert_eq!(groups[&1].len(), 2);
        assert_eq!(groups[&2].len(), 1);
    }

    #[test]
    fn test_validate_reports_missing_signature() {
        let markers = scan("[SIGN_HERE] [DATE_2]");
        let issues = validate_for_signer_count(&markers, 2);
        assert_eq!(
            issues,
            vec![PlacementIssue::MissingSignature { signer_index: 1 }]
        );
        assert!(issues[0].to_string().contains("signer 2"));
    }

    #[test]
    fn test_validate_reports_out_of_range_marker() {
        let markers = scan("[SIGN_HERE] [SIGN_HERE_5]");
        let issues = validate_for_signer_count(&markers, 1);
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            PlacementIssue::SignerOutOfRange {
                signer_index,
                signer_count,
                ..
            } => {
                assert_eq!(*signer_index, 4);
                assert_eq!(*signer_count, 1);
            }
            other => panic!("unexpected issue: {other:?}"),
        }
    }

    #[test]
    fn test_validate_clean_placement_is_empty() {
        let markers = scan("[SIGN_HERE] [SIGN_HERE_2]");
        assert!(validate_for_signer_count(&markers, 2).is_empty());
    }

    proptest! {
        #[test]
        fn prop_marker_grammar_round_trips(
            keyword_idx in 0usize..10,
            index in proptest::option::of(1usize..=99),
        ) {
            const KEYWORDS: [(&str, FieldKind); 10] = [
                ("SIGN_HERE", FieldKind::Signature),
                ("SIGNATURE_HERE", FieldKind::Signature),
                ("SIGN", FieldKind::Signature),
                ("INITIAL_HERE", FieldKind::Initials),
                ("INITIALS_HERE", FieldKind::Initials),
                ("INITIAL", FieldKind::Initials),
                ("DATE_HERE", FieldKind::Date),
                ("DATE", FieldKind::Date),
                ("TEXT_HERE", FieldKind::Text),
                ("TEXT", FieldKind::Text),
            ];
            let (keyword, expected_kind) = KEYWORDS[keyword_idx];
            let marker = match index {
                Some(n) => format!("[{keyword}_{n}]"),
                None => format!("[{keyword}]"),
            };
            let text = format!("lead text {marker} tail text");
            let markers = scan(&text);
            prop_assert_eq!(markers.len(), 1);
            prop_assert_eq!(markers[0].kind, expected_kind);
            prop_assert_eq!(markers[0].signer_index, index.unwrap_or(1) - 1);
            prop_assert_eq!(markers[0].marker_text.as_str(), marker.as_str());
        }

        #[test]
        fn prop_positions_stay_inside_heuristic_band(
            lead in "[a-z ]{0,120}",
            tail in "[a-z ]{0,120}",
        ) {
            let text = format!("{lead}[SIGN_HERE]{tail}");
            let markers = scan(&text);
            prop_assert_eq!(markers.len(), 1);
            // The heuristic keeps positions inside a 10% margin band.
            prop_assert!(markers[0].x >= 0.1 * 612.0 - 1e-9);
            prop_assert!(markers[0].x <= 0.9 * 612.0 + 1e-9);
            prop_assert!(markers[0].y >= 0.1 * 792.0 - 1e-9);
            prop_assert!(markers[0].y <= 0.9 * 792.0 + 1e-9);
        }
    }
}
