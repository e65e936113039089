// merge.rs — Fold a list of proposals into one rule document.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rk_changeset::{merge_proposals, Proposal};

use super::read_text;

#[derive(Args)]
pub struct MergeArgs {
    /// Target document path the proposals apply to.
    #[arg(long)]
    pub path: String,
    /// Current document text (omit for a document that does not exist yet).
    #[arg(long)]
    pub existing: Option<PathBuf>,
    /// JSON array of proposals, in acceptance order.
    pub proposals: PathBuf,
}

pub fn execute(args: &MergeArgs) -> anyhow::Result<()> {
    let proposals = load_proposals(&args.proposals)?;
    let existing = args.existing.as_deref().map(read_text).transpose()?;

    let refs: Vec<&Proposal> = proposals.iter().collect();
    let report = merge_proposals(&args.path, existing.as_deref(), &refs)?;
    if report.anchors_missed > 0 || report.spans_missed > 0 {
        tracing::warn!(
            path = %report.path,
            anchors_missed = report.anchors_missed,
            spans_missed = report.spans_missed,
            "some edits did not land where they were anchored"
        );
    }
    print!("{}", report.text);
    Ok(())
}

/// Parse and validate a JSON array of proposals.
pub fn load_proposals(path: &std::path::Path) -> anyhow::Result<Vec<Proposal>> {
    let json = read_text(path)?;
    let proposals: Vec<Proposal> =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    for (i, proposal) in proposals.iter().enumerate() {
        proposal
            .validate()
            .with_context(|| format!("proposal #{} in {}", i + 1, path.display()))?;
    }
    Ok(proposals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposals_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(
            &path,
            r#"[{"target_path": "a.mdc", "operation": "update",
                 "edits": [{"kind": "replacement", "content": "x"}]}]"#,
        )
        .unwrap();
        let err = load_proposals(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("proposal #1"));
    }

    #[test]
    fn valid_proposals_load_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(
            &path,
            r#"[{"target_path": "a.mdc", "operation": "update",
                 "edits": [{"kind": "addition", "content": "- one"}]},
                {"target_path": "a.mdc", "operation": "update",
                 "edits": [{"kind": "addition", "content": "- two"}]}]"#,
        )
        .unwrap();
        let proposals = load_proposals(&path).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[1].edits[0].content, "- two");
    }
}
