//! Context-window bookkeeping: token estimation and the compaction
//! selection policy (§4.5.5).

use crate::message::{Record, RecordStatus, Role};

/// Approximate one token per 4 characters, the same heuristic the SDK has
/// always used for manual context-window control (70-85% accurate across
/// model families per its own documentation). The session prefers
/// provider-reported usage when it has it; this estimate only matters
/// before the first provider round of a turn has reported real numbers.
pub fn estimate_tokens(text: &str) -> u64 {
    ((text.chars().count() as f64) / 4.0).ceil() as u64
}

/// A record's token contribution: provider-reported counts if the record
/// has been attributed (`input_tokens + output_tokens > 0`), otherwise a
/// character-based estimate of its text content.
pub fn record_tokens(record: &Record) -> u64 {
    let reported = record.input_tokens + record.output_tokens;
    if reported > 0 {
        return reported;
    }
    estimate_tokens(&record.message().get_text())
}

pub fn live_tokens(records: &[Record]) -> u64 {
    records.iter().filter(|r| r.live).map(record_tokens).sum()
}

/// `live_tokens / max_tokens`, the trigger value compared against the
/// compaction threshold.
pub fn percent_full(records: &[Record], max_tokens: u64) -> f64 {
    if max_tokens == 0 {
        return 0.0;
    }
    live_tokens(records) as f64 / max_tokens as f64
}

/// A contiguous run of records chosen for compaction: never splits an
/// assistant(tool-call)+tool(tool-result) pair, never touches the system
/// record, and never includes a `pending` record.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionSelection {
    pub records: Vec<Record>,
}

impl CompactionSelection {
    pub fn tokens(&self) -> u64 {
        self.records.iter().map(record_tokens).sum()
    }
}

/// Selects records to compact per §4.5.5: starting immediately after the
/// system record, in insertion order, accumulating whole message groups
/// until cumulative tokens reach `reclaim_target`. An assistant record that
/// carries tool calls is grouped with the following tool-result record (if
/// present) so a group is never split mid-pair. The still-pending record of
/// the current turn and any already-dead record are ineligible.
pub fn select_for_compaction(live_records: &[Record], reclaim_target: u64) -> CompactionSelection {
    if reclaim_target == 0 {
        return CompactionSelection { records: vec![] };
    }

    let eligible: Vec<&Record> = live_records
        .iter()
        .filter(|r| r.role != Role::System && r.status != RecordStatus::Pending)
        .collect();

    let mut selected = Vec::new();
    let mut accumulated = 0u64;
    let mut i = 0;
    while i < eligible.len() && accumulated < reclaim_target {
        let current = eligible[i];
        let mut group = vec![current.clone()];
        let mut group_tokens = record_tokens(current);

        if current.role == Role::Assistant && current.message().has_tool_calls() {
            if let Some(next) = eligible.get(i + 1) {
                if next.role == Role::Tool {
                    group.push((*next).clone());
                    group_tokens += record_tokens(next);
                    i += 1;
                }
            }
        }

        selected.extend(group);
        accumulated += group_tokens;
        i += 1;
    }

    CompactionSelection { records: selected }
}

/// Reclaim target per §4.5.5: compact down to half the threshold.
pub fn reclaim_target(live_tokens: u64, max_tokens: u64, threshold: f64) -> u64 {
    let floor = ((threshold * max_tokens as f64) * 0.5).floor() as u64;
    live_tokens.saturating_sub(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use chrono::Utc;

    fn rec(role: Role, text: &str, status: RecordStatus) -> Record {
        let mut r = Record::new("s1", Message::new(role, vec![crate::content::ContentBlock::text(text)]), Utc::now());
        r.status = status;
        r
    }

    #[test]
    fn test_estimate_tokens_roughly_one_per_four_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_record_tokens_prefers_reported_over_estimate() {
        let mut r = rec(Role::User, "hello world", RecordStatus::Success);
        r.input_tokens = 42;
        assert_eq!(record_tokens(&r), 42);
    }

    #[test]
    fn test_percent_full_zero_max_tokens_is_zero() {
        assert_eq!(percent_full(&[], 0), 0.0);
    }

    #[test]
    fn test_reclaim_target_compacts_to_half_threshold() {
        // threshold 0.1, max_tokens 1000 -> floor = 50; live 200 -> target 150
        assert_eq!(reclaim_target(200, 1000, 0.1), 150);
    }

    #[test]
    fn test_select_excludes_system_and_pending() {
        let records = vec![
            rec(Role::System, "sys", RecordStatus::Success),
            rec(Role::User, "hello there friend", RecordStatus::Success),
            rec(Role::User, "pending one", RecordStatus::Pending),
        ];
        let selection = select_for_compaction(&records, 1000);
        assert_eq!(selection.records.len(), 1);
        assert_eq!(selection.records[0].role, Role::User);
    }

    #[test]
    fn test_select_keeps_tool_call_result_pair_together() {
        let mut assistant = rec(Role::Assistant, "", RecordStatus::Success);
        assistant.contents = vec![crate::content::ContentBlock::tool_call("t1", "echo", "{}")];
        let tool = rec(Role::Tool, "result text", RecordStatus::Success);

        let records = vec![assistant, tool];
        // reclaim_target small enough that only the first group "should" be
        // needed by token count alone, but the pair must stay together.
        let selection = select_for_compaction(&records, 1);
        assert_eq!(selection.records.len(), 2);
    }

    #[test]
    fn test_select_stops_once_target_reached() {
        let records: Vec<_> = (0..10)
            .map(|i| rec(Role::User, &format!("message number {i} here"), RecordStatus::Success))
            .collect();
        let per_record = record_tokens(&records[0]);
        let selection = select_for_compaction(&records, per_record * 3);
        assert!(selection.records.len() >= 3);
        assert!(selection.records.len() < 10);
    }
}
