use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::block::Block;
use crate::error::{FrameError, Result};
use crate::header::{Header, HEADER_LEN};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Result of one parse call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Completed blocks in wire order. Empty while a frame is still pending.
    pub blocks: Vec<Block>,
    /// Bytes still needed to finish the pending frame (0 if none).
    ///
    /// A lower bound of 1 when [`length_pending`](Self::length_pending) is set.
    pub still_needed: usize,
    /// The input ended before the pending `INFOM` frame's length was known:
    /// inside its tag, before its separator or inside its length digits.
    pub length_pending: bool,
    /// Bytes skipped because they did not start a known header.
    pub skipped: usize,
}

impl ParseOutcome {
    /// Returns true when no frame is waiting for more bytes.
    pub fn is_complete(&self) -> bool {
        self.still_needed == 0
    }
}

#[derive(Debug)]
enum Pending {
    /// An `INFOM` payload of known length, partly received.
    Payload {
        payload: BytesMut,
        still_needed: usize,
    },
    /// The frame starting at `resume_at` cannot be delimited yet. It is
    /// scanned again from there once more bytes arrive.
    Length { resume_at: usize },
}

/// Stateful incremental parser for one delivery unit of server text.
///
/// [`parse_data`](FrameParser::parse_data) starts a fresh pass; when it reports
/// `still_needed > 0` the caller fetches more bytes from the transport and
/// feeds them to [`continue_parse`](FrameParser::continue_parse) until the
/// pending frame is complete. Blocks of a pass are released together once
/// nothing is pending, so the caller always sees them in wire order.
///
/// An `INFOM` frame cut anywhere (tag, separator, length digits or payload)
/// parses the same as if it had arrived in one piece.
#[derive(Debug)]
pub struct FrameParser {
    data: BytesMut,
    cursor: usize,
    blocks: Vec<Block>,
    pending: Option<Pending>,
    skipped: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            cursor: 0,
            blocks: Vec::new(),
            pending: None,
            skipped: 0,
        }
    }

    /// Reset all state and parse `chunk` from its start.
    ///
    /// Any frame left pending by a previous pass is discarded.
    pub fn parse_data(&mut self, chunk: &[u8]) -> Result<ParseOutcome> {
        self.reset();
        self.data.extend_from_slice(chunk);
        self.scan()?;
        Ok(self.outcome())
    }

    /// Feed bytes for the frame left pending by the previous call.
    ///
    /// A known-length payload takes at most its still-needed bytes; any surplus
    /// is scanned as further frames of the same pass. A frame whose length was
    /// not yet known is scanned again from its tag.
    pub fn continue_parse(&mut self, chunk: &[u8]) -> Result<ParseOutcome> {
        let pending = self
            .pending
            .take()
            .ok_or(FrameError::ContinueWithoutPending)?;
        self.data.extend_from_slice(chunk);

        match pending {
            Pending::Length { resume_at } => {
                self.cursor = resume_at;
                self.scan()?;
            }
            Pending::Payload {
                mut payload,
                still_needed,
            } => {
                let take = chunk.len().min(still_needed);
                payload.extend_from_slice(&chunk[..take]);
                self.cursor += take;

                if take == still_needed {
                    debug!(size = payload.len(), "pending frame completed");
                    self.blocks
                        .push(Block::new(Header::Infom, payload.freeze()));
                    self.scan()?;
                } else {
                    self.pending = Some(Pending::Payload {
                        payload,
                        still_needed: still_needed - take,
                    });
                }
            }
        }

        Ok(self.outcome())
    }

    /// Bytes still needed by the pending frame (0 if none).
    pub fn still_needed(&self) -> usize {
        match &self.pending {
            None => 0,
            Some(Pending::Payload { still_needed, .. }) => *still_needed,
            Some(Pending::Length { .. }) => 1,
        }
    }

    /// Returns true while a frame is waiting for more bytes.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Clear all parse state.
    pub fn reset(&mut self) {
        self.data.clear();
        self.cursor = 0;
        self.blocks.clear();
        self.pending = None;
        self.skipped = 0;
    }

    fn outcome(&mut self) -> ParseOutcome {
        let skipped = std::mem::take(&mut self.skipped);
        if skipped > 0 {
            warn!(skipped, "skipped bytes outside any known header");
        }
        if self.pending.is_some() {
            return ParseOutcome {
                blocks: Vec::new(),
                still_needed: self.still_needed(),
                length_pending: matches!(self.pending, Some(Pending::Length { .. })),
                skipped,
            };
        }
        ParseOutcome {
            blocks: std::mem::take(&mut self.blocks),
            still_needed: 0,
            length_pending: false,
            skipped,
        }
    }

    /// Stop the pass and rescan from `resume_at` when more bytes arrive.
    fn wait_for_length(&mut self, resume_at: usize) {
        debug!(resume_at, "frame length not yet known");
        self.pending = Some(Pending::Length { resume_at });
        self.cursor = self.data.len();
    }

    fn scan(&mut self) -> Result<()> {
        while self.cursor < self.data.len() {
            let rest = &self.data[self.cursor..];
            let Some(header) = rest.get(..HEADER_LEN).and_then(Header::from_tag) else {
                if Header::any_cut(rest) {
                    self.wait_for_length(self.cursor);
                    return Ok(());
                }
                self.cursor += 1;
                self.skipped += 1;
                continue;
            };

            let header_start = self.cursor;
            self.cursor += HEADER_LEN;
            self.skip_separator();

            match header {
                Header::Infom => {
                    if !self.parse_infom(header_start)? {
                        return Ok(());
                    }
                }
                // MESSG swallows the rest of the delivery unit so a chat line
                // can never smuggle in a forged control frame.
                Header::Messg => {
                    let payload = Bytes::copy_from_slice(&self.data[self.cursor..]);
                    self.cursor = self.data.len();
                    self.blocks.push(Block::new(header, payload));
                    return Ok(());
                }
                other => {
                    if !self.parse_tokens(other, header_start) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn skip_separator(&mut self) {
        if self
            .data
            .get(self.cursor)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.cursor += 1;
        }
    }

    /// Returns false when the frame is incomplete and the pass must stop.
    fn parse_infom(&mut self, header_start: usize) -> Result<bool> {
        let digits_len = self.data[self.cursor..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits_end = self.cursor + digits_len;
        if digits_len == 0 && digits_end < self.data.len() {
            return Err(FrameError::MissingLength {
                offset: header_start,
            });
        }

        let digits = &self.data[self.cursor..digits_end];
        let declared = if digits_len == 0 {
            0
        } else {
            std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| FrameError::InvalidLength {
                    offset: header_start,
                    digits: String::from_utf8_lossy(digits).into_owned(),
                })?
        };

        // More digits may follow in the next read.
        if digits_end == self.data.len() {
            self.wait_for_length(header_start);
            return Ok(false);
        }
        self.cursor = digits_end;

        let available = self.data.len() - self.cursor;
        if available >= declared {
            let payload = Bytes::copy_from_slice(&self.data[self.cursor..self.cursor + declared]);
            self.cursor += declared;
            self.blocks.push(Block::new(Header::Infom, payload));
            return Ok(true);
        }

        debug!(declared, available, "INFOM frame split across reads");
        self.pending = Some(Pending::Payload {
            payload: BytesMut::from(&self.data[self.cursor..]),
            still_needed: declared - available,
        });
        self.cursor = self.data.len();
        Ok(false)
    }

    /// Collect whitespace-delimited runs until end of input or a run that
    /// carries an embedded header tag.
    ///
    /// Returns false when the input ends in a cut `INFOM` tag standing as its
    /// own run; the whole frame is then scanned again with the next read.
    fn parse_tokens(&mut self, header: Header, header_start: usize) -> bool {
        let data = &self.data[..];
        let mut cursor = self.cursor;
        let mut payload = BytesMut::new();

        loop {
            let ws = data[cursor..]
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            payload.extend_from_slice(&data[cursor..cursor + ws]);
            cursor += ws;
            if cursor >= data.len() {
                break;
            }

            let run_len = data[cursor..]
                .iter()
                .take_while(|b| !b.is_ascii_whitespace())
                .count();
            let run = &data[cursor..cursor + run_len];

            if Header::starts(run) {
                break;
            }
            if Header::ends(run) {
                let keep = run_len - HEADER_LEN;
                payload.extend_from_slice(&run[..keep]);
                cursor += keep;
                break;
            }
            if cursor + run_len == data.len() && Header::Infom.is_cut(run) {
                self.wait_for_length(header_start);
                return false;
            }

            payload.extend_from_slice(run);
            cursor += run_len;
        }

        self.cursor = cursor;
        self.blocks.push(Block::new(header, payload.freeze()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ParseOutcome {
        FrameParser::new().parse_data(input.as_bytes()).unwrap()
    }

    fn pairs(outcome: &ParseOutcome) -> Vec<(Header, String)> {
        outcome
            .blocks
            .iter()
            .map(|b| (b.header, b.text().into_owned()))
            .collect()
    }

    #[test]
    fn messg_swallows_embedded_headers() {
        let out = parse("MESSG hello ACEPT world");
        assert_eq!(
            pairs(&out),
            vec![(Header::Messg, "hello ACEPT world".to_string())]
        );
        assert_eq!(out.still_needed, 0);
    }

    #[test]
    fn embedded_header_starts_next_block() {
        let out = parse("NOTIF foo bar INFOM 5hello");
        assert_eq!(
            pairs(&out),
            vec![
                (Header::Notif, "foo bar ".to_string()),
                (Header::Infom, "hello".to_string()),
            ]
        );
    }

    #[test]
    fn header_glued_to_end_of_run_is_recovered() {
        let out = parse("ACEPT done.REJEC nope");
        assert_eq!(
            pairs(&out),
            vec![
                (Header::Acept, "done.".to_string()),
                (Header::Rejec, "nope".to_string()),
            ]
        );
    }

    #[test]
    fn successive_frames_including_messg() {
        let out = parse("ACEPT ok RESLT you hit for 4 MESSG bob: RESLT fake");
        assert_eq!(
            pairs(&out),
            vec![
                (Header::Acept, "ok ".to_string()),
                (Header::Reslt, "you hit for 4 ".to_string()),
                (Header::Messg, "bob: RESLT fake".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_tag_makes_progress() {
        let out = parse("NOTIF NOTIF x");
        assert_eq!(
            pairs(&out),
            vec![
                (Header::Notif, String::new()),
                (Header::Notif, "x".to_string()),
            ]
        );
    }

    #[test]
    fn whitespace_inside_payload_is_preserved() {
        let out = parse("NOTIF line one\nline  two");
        assert_eq!(
            pairs(&out),
            vec![(Header::Notif, "line one\nline  two".to_string())]
        );
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let out = parse("");
        assert!(out.blocks.is_empty());
        assert_eq!(out.still_needed, 0);
        assert_eq!(out.skipped, 0);
    }

    #[test]
    fn bare_tag_yields_empty_payload() {
        let out = parse("ACEPT");
        assert_eq!(pairs(&out), vec![(Header::Acept, String::new())]);
    }

    #[test]
    fn infom_zero_length_is_complete() {
        let out = parse("INFOM 0NOTIF x");
        assert_eq!(
            pairs(&out),
            vec![(Header::Infom, String::new()), (Header::Notif, "x".to_string())]
        );
        assert!(out.is_complete());
    }

    #[test]
    fn digits_at_end_of_input_wait_for_more() {
        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"INFOM 0").unwrap();
        assert!(first.blocks.is_empty());
        assert!(first.length_pending);
        assert_eq!(first.still_needed, 1);

        let second = parser.continue_parse(b"ACEPT ok").unwrap();
        assert_eq!(
            pairs(&second),
            vec![(Header::Infom, String::new()), (Header::Acept, "ok".to_string())]
        );
        assert!(!second.length_pending);
    }

    #[test]
    fn infom_length_is_exact() {
        let out = parse("INFOM 3abcNOTIF rest");
        assert_eq!(
            pairs(&out),
            vec![
                (Header::Infom, "abc".to_string()),
                (Header::Notif, "rest".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_bytes_are_skipped_and_counted() {
        let out = parse("xyACEPT ok");
        assert_eq!(pairs(&out), vec![(Header::Acept, "ok".to_string())]);
        assert_eq!(out.skipped, 2);
    }

    #[test]
    fn trailing_partial_tag_is_skipped() {
        let out = parse("ACEPT ok\u{1}AC");
        assert_eq!(pairs(&out), vec![(Header::Acept, "ok\u{1}AC".to_string())]);

        let out = parse("xyz");
        assert!(out.blocks.is_empty());
        assert!(out.is_complete());
        assert_eq!(out.skipped, 3);
    }

    #[test]
    fn cut_tag_at_header_position_waits() {
        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"xyREJ").unwrap();
        assert!(first.length_pending);
        assert_eq!(first.skipped, 2);

        let second = parser.continue_parse(b"EC no").unwrap();
        assert_eq!(pairs(&second), vec![(Header::Rejec, "no".to_string())]);
        assert_eq!(second.skipped, 0);
    }

    #[test]
    fn input_ending_right_after_infom_tag_waits() {
        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"NOTIF hi INFOM").unwrap();
        assert!(first.blocks.is_empty());
        assert!(first.length_pending);

        let second = parser.continue_parse(b" 5hello").unwrap();
        assert_eq!(
            pairs(&second),
            vec![
                (Header::Notif, "hi ".to_string()),
                (Header::Infom, "hello".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_word_that_could_start_infom_waits() {
        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"NOTIF it was I").unwrap();
        assert!(first.length_pending);

        let second = parser.continue_parse(b"NOTIF next").unwrap();
        assert_eq!(
            pairs(&second),
            vec![
                (Header::Notif, "it was I".to_string()),
                (Header::Notif, "next".to_string()),
            ]
        );
    }

    #[test]
    fn infom_without_length_is_an_error() {
        let err = FrameParser::new().parse_data(b"ACEPT ok INFOM abc").unwrap_err();
        assert_eq!(err, FrameError::MissingLength { offset: 9 });
    }

    #[test]
    fn infom_with_overflowing_length_is_an_error() {
        let err = FrameParser::new()
            .parse_data(b"INFOM 99999999999999999999999999abc")
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { offset: 0, .. }));
    }

    #[test]
    fn split_infom_reassembles_across_continues() {
        let full = "ACEPT ok INFOM 11hello world";
        let expected = parse(full);

        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"ACEPT ok INFOM 11hel").unwrap();
        assert!(first.blocks.is_empty());
        assert_eq!(first.still_needed, 8);
        assert!(parser.is_pending());

        let second = parser.continue_parse(b"lo w").unwrap();
        assert!(second.blocks.is_empty());
        assert_eq!(second.still_needed, 4);

        let third = parser.continue_parse(b"orld").unwrap();
        assert!(third.is_complete());
        assert_eq!(third.blocks, expected.blocks);
        assert!(!parser.is_pending());
    }

    #[test]
    fn surplus_after_pending_frame_is_parsed() {
        let mut parser = FrameParser::new();
        let first = parser.parse_data(b"INFOM 4ab").unwrap();
        assert_eq!(first.still_needed, 2);

        let second = parser.continue_parse(b"cdACEPT yes").unwrap();
        assert_eq!(
            pairs(&second),
            vec![
                (Header::Infom, "abcd".to_string()),
                (Header::Acept, "yes".to_string()),
            ]
        );
    }

    #[test]
    fn surplus_can_leave_another_frame_pending() {
        let mut parser = FrameParser::new();
        parser.parse_data(b"INFOM 2a").unwrap();

        let second = parser.continue_parse(b"bINFOM 3x").unwrap();
        assert!(second.blocks.is_empty());
        assert_eq!(second.still_needed, 2);

        let third = parser.continue_parse(b"yz").unwrap();
        assert_eq!(
            pairs(&third),
            vec![
                (Header::Infom, "ab".to_string()),
                (Header::Infom, "xyz".to_string()),
            ]
        );
    }

    #[test]
    fn continue_without_pending_is_rejected() {
        let mut parser = FrameParser::new();
        parser.parse_data(b"ACEPT ok").unwrap();
        assert_eq!(
            parser.continue_parse(b"more").unwrap_err(),
            FrameError::ContinueWithoutPending
        );
    }

    #[test]
    fn parse_data_discards_previous_pending_frame() {
        let mut parser = FrameParser::new();
        parser.parse_data(b"INFOM 100abc").unwrap();
        assert!(parser.is_pending());

        let out = parser.parse_data(b"ACEPT ok").unwrap();
        assert_eq!(pairs(&out), vec![(Header::Acept, "ok".to_string())]);
        assert_eq!(parser.still_needed(), 0);
    }

    #[test]
    fn identical_input_parses_identically() {
        let mut parser = FrameParser::new();
        let input = b"NOTIF a b RESLT c INFOM 2de MESSG f";
        let first = parser.parse_data(input).unwrap();
        let second = parser.parse_data(input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn well_formed_frames_reconstruct_content() {
        let frames = [
            (Header::Acept, "welcome "),
            (Header::Infom, "GameDescription:x"),
            (Header::Notif, "a note "),
            (Header::Messg, "hi REJEC there"),
        ];
        let wire: String = frames
            .iter()
            .map(|(h, p)| match h {
                Header::Infom => format!("{h} {}{p}", p.len()),
                _ => format!("{h} {p}"),
            })
            .collect();

        let out = parse(&wire);
        assert!(out.is_complete());
        let got: Vec<(Header, String)> = pairs(&out);
        let want: Vec<(Header, String)> =
            frames.iter().map(|(h, p)| (*h, p.to_string())).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn byte_by_byte_continuation_matches_one_shot() {
        let full = b"INFOM 12abcdefghijklRESLT end";
        let expected = FrameParser::new().parse_data(full).unwrap();

        let mut parser = FrameParser::new();
        let mut out = parser.parse_data(&full[..8]).unwrap();
        let mut pos = 8;
        while !out.is_complete() {
            out = parser.continue_parse(&full[pos..pos + 1]).unwrap();
            pos += 1;
        }
        let rest = parser.continue_parse(b"");
        assert!(rest.is_err());

        // The trailing frame arrives only when the caller delivers it.
        assert_eq!(out.blocks[0], expected.blocks[0]);
    }

    /// Feed pieces the way a receive loop does: continue while a frame is
    /// pending, otherwise start a new delivery.
    fn feed(pieces: &[&[u8]]) -> Vec<(Header, String)> {
        let mut parser = FrameParser::new();
        let mut got = Vec::new();
        for piece in pieces {
            let out = if parser.is_pending() {
                parser.continue_parse(piece).unwrap()
            } else {
                parser.parse_data(piece).unwrap()
            };
            got.extend(pairs(&out));
        }
        assert!(!parser.is_pending(), "frame left pending for {pieces:?}");
        got
    }

    const CUT_WIRE: &[u8] = b"NOTIF hi INFOM 12hello world!";

    /// Offsets inside the `NOTIF` tag and anywhere from the `INFOM` tag on.
    /// A token payload ends with its read, so cuts inside `hi ` differ.
    fn cut_offsets() -> impl Iterator<Item = usize> {
        (1..HEADER_LEN).chain(9..CUT_WIRE.len())
    }

    #[test]
    fn any_single_cut_matches_one_shot() {
        let expected = pairs(&FrameParser::new().parse_data(CUT_WIRE).unwrap());
        assert_eq!(
            expected,
            vec![
                (Header::Notif, "hi ".to_string()),
                (Header::Infom, "hello world!".to_string()),
            ]
        );

        for at in cut_offsets() {
            let (head, tail) = CUT_WIRE.split_at(at);
            assert_eq!(feed(&[head, tail]), expected, "cut at {at}");
        }
    }

    #[test]
    fn any_double_cut_in_infom_frame_matches_one_shot() {
        let expected = pairs(&FrameParser::new().parse_data(CUT_WIRE).unwrap());
        for first in 9..CUT_WIRE.len() {
            for second in first + 1..CUT_WIRE.len() {
                let pieces = [
                    &CUT_WIRE[..first],
                    &CUT_WIRE[first..second],
                    &CUT_WIRE[second..],
                ];
                assert_eq!(feed(&pieces), expected, "cuts at {first} and {second}");
            }
        }
    }

    #[test]
    fn byte_by_byte_from_infom_tag_matches_one_shot() {
        let expected = pairs(&FrameParser::new().parse_data(CUT_WIRE).unwrap());
        let mut pieces: Vec<&[u8]> = vec![&CUT_WIRE[..9]];
        pieces.extend(CUT_WIRE[9..].chunks(1));
        assert_eq!(feed(&pieces), expected);
    }
}
