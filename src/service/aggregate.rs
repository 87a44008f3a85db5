//! 结果汇总 / 争议问题列表 / CSV 导出

use super::engine::total_overcharge;
use crate::models::{
    Disposition, DisputeIssue, FindingOutcome, ResultsSummary, Session,
};
use bigdecimal::{BigDecimal, Zero};
use std::io::Write;

/// 会话结果
///
/// 有评估且对话服务给出了总额时以其为准, 否则回退到所有 finding 的潜在多收之和。
pub fn results(session: &Session) -> ResultsSummary {
    let assessment = session.assessment.as_ref();

    let outcomes: Vec<FindingOutcome> = session
        .findings
        .iter()
        .map(|finding| FindingOutcome {
            finding: finding.clone(),
            disposition: assessment
                .map(|a| a.disposition(finding.id))
                .unwrap_or(Disposition::Pending),
        })
        .collect();

    let total_potential_savings = session.total_potential_savings.clone();

    let confirmed_savings = assessment.map(|_| {
        total_overcharge(
            outcomes
                .iter()
                .filter(|o| o.disposition == Disposition::Confirmed)
                .map(|o| &o.finding),
        )
    });

    let total_savings = assessment
        .and_then(|a| a.reported_total.clone())
        .unwrap_or_else(|| total_potential_savings.clone());

    ResultsSummary {
        session_id: session.id.clone(),
        bill_data: session.snapshot.clone(),
        snapshot_version: session.snapshot_version,
        discrepancies: session.findings.clone(),
        outcomes,
        assessment: session.assessment.clone(),
        state: session.state,
        issues_found: session.findings.len(),
        total_potential_savings,
        confirmed_savings,
        total_savings,
        chat_history: session.transcript.clone(),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }
}

/// 争议信中列出的问题: 未被排除的 finding + 患者提出的新问题
pub fn dispute_issues(session: &Session) -> Vec<DisputeIssue> {
    let assessment = session.assessment.as_ref();
    let mut issues: Vec<DisputeIssue> = session
        .findings
        .iter()
        .filter(|f| {
            assessment
                .map(|a| a.disposition(f.id) != Disposition::Cleared)
                .unwrap_or(true)
        })
        .map(|f| DisputeIssue {
            kind: f.kind.to_string(),
            description: f.description.clone(),
            potential_overcharge: f.potential_overcharge.clone(),
        })
        .collect();

    if let Some(a) = assessment {
        issues.extend(a.new_concerns.iter().map(|concern| DisputeIssue {
            kind: "patient_reported".to_string(),
            description: concern.clone(),
            potential_overcharge: BigDecimal::zero(),
        }));
    }
    issues
}

/// 导出 finding 到 CSV (带表头)
pub fn export_findings_csv<W: Write>(session: &Session, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "id",
        "type",
        "severity",
        "confidence",
        "items",
        "potential_overcharge",
        "avg_price",
        "high_price",
        "disposition",
        "description",
    ])?;

    let summary = results(session);
    for outcome in &summary.outcomes {
        let f = &outcome.finding;
        let items = f
            .items_involved
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            f.id.to_string(),
            f.kind.to_string(),
            f.severity.to_string(),
            f.confidence.to_string(),
            items,
            f.potential_overcharge.to_string(),
            f.reference.as_ref().map(|r| r.avg_price.to_string()).unwrap_or_default(),
            f.reference.as_ref().map(|r| r.high_price.to_string()).unwrap_or_default(),
            outcome.disposition.as_str().to_string(),
            f.description.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
