//! Incremental classifier for the engine's combined output stream.
//!
//! The engine writes free-form progress text; the only lines that matter are
//! throughput lines, per-candidate private-key lines, and the address/WIF/HEX
//! line group emitted around a hit. Bytes arrive in arbitrary chunks, so the
//! parser carries the partial line and the latest throughput string as
//! explicit state rather than re-reading anything.

pub const SPEED_MARKER: &str = "MK/s";
pub const PRIV_HEX_MARKER: &str = "Priv (HEX):";
pub const PRIV_WIF_MARKER: &str = "Priv (WIF):";
pub const PUB_ADDR_MARKER: &str = "Public Addr:";

/// Hit on the fixed target address. `priv_wif`/`priv_hex` stay `None` when
/// the stream ends before the engine prints them; a partial hit is still
/// reported and persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMatch {
    pub pub_addr: String,
    pub priv_wif: Option<String>,
    pub priv_hex: Option<String>,
}

impl TargetMatch {
    fn complete(&self) -> bool {
        self.priv_wif.is_some() && self.priv_hex.is_some()
    }
}

/// What the process controller must do after feeding data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    Continue,
    /// The target hit resolved; kill the engine before reading further.
    MatchFound,
}

pub struct StreamParser {
    target: String,
    partial: String,
    latest_speed: String,
    candidates: Vec<String>,
    hit: Option<TargetMatch>,
    resolved: bool,
}

impl StreamParser {
    pub fn new(target: &str) -> Self {
        StreamParser {
            target: target.to_string(),
            partial: String::new(),
            latest_speed: String::new(),
            candidates: Vec::new(),
            hit: None,
            resolved: false,
        }
    }

    /// Feeds one chunk of engine output. Lines end on `\r` or `\n`.
    pub fn push(&mut self, chunk: &str) -> ParseStep {
        for ch in chunk.chars() {
            if ch == '\r' || ch == '\n' {
                let line = std::mem::take(&mut self.partial);
                if self.feed_line(line.trim()) == ParseStep::MatchFound {
                    return ParseStep::MatchFound;
                }
            } else {
                self.partial.push(ch);
            }
        }
        ParseStep::Continue
    }

    /// Marks end of stream. An unterminated trailing line is dropped, never
    /// classified. A pending target hit resolves with whatever key fields
    /// were captured so far.
    pub fn finish(&mut self) -> ParseStep {
        self.partial.clear();
        if self.hit.is_some() && !self.resolved {
            self.resolved = true;
            return ParseStep::MatchFound;
        }
        ParseStep::Continue
    }

    fn feed_line(&mut self, line: &str) -> ParseStep {
        // After the target address was seen, only the WIF/HEX lines of the
        // hit are consumed until both are captured.
        if let Some(hit) = self.hit.as_mut() {
            if !self.resolved {
                if let Some(rest) = value_after(line, PRIV_WIF_MARKER) {
                    hit.priv_wif.get_or_insert_with(|| rest.trim().to_string());
                }
                if let Some(rest) = value_after(line, PRIV_HEX_MARKER) {
                    hit.priv_hex.get_or_insert_with(|| normalize_key(rest));
                }
                if hit.complete() {
                    self.resolved = true;
                    return ParseStep::MatchFound;
                }
            }
            return ParseStep::Continue;
        }

        if line.contains(SPEED_MARKER) {
            self.latest_speed = line.to_string();
        }
        if let Some(rest) = value_after(line, PRIV_HEX_MARKER) {
            let key = normalize_key(rest);
            if !self.candidates.contains(&key) {
                self.candidates.push(key);
            }
        }
        if let Some(rest) = value_after(line, PUB_ADDR_MARKER) {
            if rest.trim() == self.target {
                self.hit = Some(TargetMatch {
                    pub_addr: rest.trim().to_string(),
                    ..TargetMatch::default()
                });
            }
        }
        ParseStep::Continue
    }

    /// Latest throughput line, for the cosmetic status redraw.
    pub fn latest_speed(&self) -> &str {
        &self.latest_speed
    }

    pub fn into_results(self) -> (Vec<String>, Option<TargetMatch>) {
        (self.candidates, self.hit)
    }
}

/// Text after the last occurrence of `marker`, if any.
fn value_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.rfind(marker).map(|idx| &line[idx + marker.len()..])
}

/// Canonical candidate form: spaces removed, optional `0x`/`0X` prefix
/// stripped, lowercase, left-zero-padded to 64 characters.
pub fn normalize_key(raw: &str) -> String {
    let mut key: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(stripped) = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        key = stripped.to_string();
    }
    let key = key.to_lowercase();
    format!("{key:0>64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "1MVDYgVaSN6iKKEsbzRUAYFrYJadLYZvvZ";

    fn parser() -> StreamParser {
        StreamParser::new(TARGET)
    }

    #[test]
    fn normalize_is_idempotent() {
        let canonical = format!("{:0>64}", "abcd");
        assert_eq!(normalize_key(&canonical), canonical);
        assert_eq!(normalize_key(&normalize_key("0xABCD")), normalize_key("0xABCD"));
    }

    #[test]
    fn normalize_strips_prefix_case_and_pads() {
        let canonical = format!("{:0>64}", "abcd");
        assert_eq!(normalize_key("0xABCD"), canonical);
        assert_eq!(normalize_key("0XABCD"), canonical);
        assert_eq!(normalize_key("  AB CD  "), canonical);
        assert_eq!(normalize_key("abcd"), canonical);
    }

    #[test]
    fn speed_line_only_touches_speed() {
        let mut p = parser();
        p.push("GPU #0: 1520.55 MK/s (GPU 1520.55 MK/s)\n");
        assert_eq!(p.latest_speed(), "GPU #0: 1520.55 MK/s (GPU 1520.55 MK/s)");
        p.push("GPU #0: 1631.02 MK/s\n");
        assert_eq!(p.latest_speed(), "GPU #0: 1631.02 MK/s");
        let (candidates, hit) = p.into_results();
        assert!(candidates.is_empty());
        assert!(hit.is_none());
    }

    #[test]
    fn private_key_lines_are_normalized_and_deduplicated() {
        let mut p = parser();
        p.push("Priv (HEX): 0xAB12  \n");
        p.push("Priv (HEX): 0xAB12  \n");
        p.push("Priv (HEX): ab12\n");
        let (candidates, _) = p.into_results();
        assert_eq!(candidates, vec![format!("{:0>64}", "ab12")]);
    }

    #[test]
    fn candidate_order_is_preserved() {
        let mut p = parser();
        p.push("Priv (HEX): 02\nPriv (HEX): 01\nPriv (HEX): 02\n");
        let (candidates, _) = p.into_results();
        assert_eq!(candidates, vec![format!("{:0>62}02", ""), format!("{:0>62}01", "")]);
    }

    #[test]
    fn repeated_marker_takes_the_value_after_the_last_occurrence() {
        let mut p = parser();
        p.push("Priv (HEX): junk Priv (HEX): ab\n");
        let (candidates, _) = p.into_results();
        assert_eq!(candidates, vec![format!("{:0>64}", "ab")]);
    }

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut p = parser();
        p.push("Priv (HE");
        p.push("X): ab");
        p.push("\n");
        let (candidates, _) = p.into_results();
        assert_eq!(candidates, vec![format!("{:0>64}", "ab")]);
    }

    #[test]
    fn foreign_address_does_not_start_match_protocol() {
        let mut p = parser();
        assert_eq!(p.push("Public Addr: 1SomeOtherAddress\n"), ParseStep::Continue);
        assert_eq!(p.finish(), ParseStep::Continue);
        let (_, hit) = p.into_results();
        assert!(hit.is_none());
    }

    #[test]
    fn match_protocol_fills_result_in_either_order() {
        let mut p = parser();
        assert_eq!(p.push(&format!("Public Addr: {TARGET}\n")), ParseStep::Continue);
        assert_eq!(p.push("some unrelated noise line\n"), ParseStep::Continue);
        assert_eq!(p.push("Priv (HEX): 0xDEAD\n"), ParseStep::Continue);
        assert_eq!(p.push("Priv (WIF): p2pkh:KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU7\n"), ParseStep::MatchFound);

        let (candidates, hit) = p.into_results();
        // keys consumed by the hit protocol are not range candidates
        assert!(candidates.is_empty());
        let hit = hit.unwrap();
        assert_eq!(hit.pub_addr, TARGET);
        assert_eq!(hit.priv_wif.as_deref(), Some("p2pkh:KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU7"));
        assert_eq!(hit.priv_hex, Some(format!("{:0>64}", "dead")));
    }

    #[test]
    fn eof_discards_unterminated_trailing_line() {
        let mut p = parser();
        p.push("Priv (HEX): ab\nPriv (HEX): cd");
        assert_eq!(p.finish(), ParseStep::Continue);
        let (candidates, _) = p.into_results();
        // the terminated line landed, the dangling one did not
        assert_eq!(candidates, vec![format!("{:0>64}", "ab")]);
    }

    #[test]
    fn eof_resolves_pending_match_with_partial_fields() {
        let mut p = parser();
        p.push(&format!("Public Addr: {TARGET}\n"));
        p.push("Priv (WIF): KzSomeWifKey\n");
        assert_eq!(p.finish(), ParseStep::MatchFound);
        let (_, hit) = p.into_results();
        let hit = hit.unwrap();
        assert_eq!(hit.priv_wif.as_deref(), Some("KzSomeWifKey"));
        assert!(hit.priv_hex.is_none());
    }

    #[test]
    fn candidates_before_hit_are_kept() {
        let mut p = parser();
        p.push("Priv (HEX): 01\n");
        assert_eq!(p.push(&format!("Public Addr: {TARGET}\n")), ParseStep::Continue);
        p.push("Priv (WIF): Kz1\n");
        assert_eq!(p.push("Priv (HEX): 02\n"), ParseStep::MatchFound);
        let (candidates, hit) = p.into_results();
        assert_eq!(candidates.len(), 1);
        assert_eq!(hit.unwrap().priv_hex, Some(format!("{:0>62}02", "")));
    }
}
