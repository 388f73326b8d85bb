use serde::Serialize;

use crate::config::PublicAppConfig;
use crate::errors::AppResult;
use crate::import::TsvPreview;
use crate::models::{
    group_label, Catechist, CatechistDetails, DashboardStats, Group, GroupDetails, GroupSummary,
    Named, Participant, ParticipantDetails, Sacrament,
};
use crate::session::SessionSummary;

/// Prints `value` as pretty JSON, or the text rendering otherwise.
pub fn emit<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let rendered = text();
        if !rendered.is_empty() {
            println!("{rendered}");
        }
    }
    Ok(())
}

pub fn participant_rows(items: &[&Participant]) -> String {
    if items.is_empty() {
        return "No participants found.".into();
    }
    items
        .iter()
        .map(|p| {
            format!(
                "{:>5}  {:<32}  {:<30}  {}",
                p.id,
                p.full_name,
                p.email,
                p.current_group_label().unwrap_or_else(|| "-".into())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn participant_line(p: &Participant) -> String {
    format!("#{} {} <{}>", p.id, p.full_name, p.email)
}

pub fn participant_details(
    details: &ParticipantDetails,
    checklist: &[(&Sacrament, bool)],
) -> String {
    let p = &details.participant;
    let mut out = vec![
        format!("#{} {}", p.id, p.full_name),
        field("Email", Some(&p.email)),
        field("Phone", Some(&p.phone_number)),
        field("Address", Some(&p.address)),
        format!(
            "  Birth date:       {}",
            p.birth_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
        ),
        field("Marital status", Some(&p.marital_status)),
        field("Father", p.father_name.as_ref()),
        field("Mother", p.mother_name.as_ref()),
        field("Baptism church", p.baptism_church.as_ref()),
        field("Communion church", p.communion_church.as_ref()),
        format!("  Registered:       {}", p.creation_date.format("%Y-%m-%d")),
        String::new(),
        "Sacraments:".into(),
    ];
    if checklist.is_empty() {
        out.push("  (none defined)".into());
    }
    for (sacrament, done) in checklist {
        let mark = if *done { "x" } else { " " };
        out.push(format!("  [{mark}] {:>3}  {}", sacrament.id, sacrament.name));
    }
    out.push(String::new());
    out.push("Group history:".into());
    out.push(history(&details.group_history));
    out.join("\n")
}

pub fn catechist_rows(items: &[&Catechist]) -> String {
    if items.is_empty() {
        return "No catechists found.".into();
    }
    items
        .iter()
        .map(|c| {
            let latest = match (c.latest_group_start_date, c.latest_group_module) {
                (Some(start), Some(module)) => format!("{} - Module {module}", group_label(start)),
                _ => "-".into(),
            };
            let status = if c.currently_active { "active" } else { "inactive" };
            format!("{:>5}  {:<32}  {:<8}  {latest}", c.id, c.full_name, status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn catechist_details(details: &CatechistDetails) -> String {
    let c = &details.catechist;
    let status = if c.currently_active { "active" } else { "inactive" };
    format!(
        "#{} {} ({status})\n\nGroup history:\n{}",
        c.id,
        c.full_name,
        history(&details.group_history)
    )
}

pub fn group_rows(items: &[&Group]) -> String {
    if items.is_empty() {
        return "No groups found.".into();
    }
    items
        .iter()
        .map(|g| {
            format!(
                "{:>5}  {:<32}  {:<10}  {}",
                g.id,
                g.display_name(),
                g.day_of_the_week,
                g.catechist_name.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn group_details(group: &GroupDetails, candidates: usize) -> String {
    let mut out = vec![
        format!(
            "#{} {} - Module {}",
            group.id,
            group_label(group.start_date),
            group.module
        ),
        field("Catechist", group.catechist_name.as_ref()),
        field("Meets on", Some(&group.day_of_the_week)),
        String::new(),
        format!("Members ({}):", group.members.len()),
    ];
    if group.members.is_empty() {
        out.push("  (none)".into());
    }
    for member in &group.members {
        out.push(format!("  {:>5}  {}", member.id, member.full_name));
    }
    out.push(String::new());
    out.push(format!("{candidates} participants available to add."));
    out.join("\n")
}

pub fn stats(stats: &DashboardStats) -> String {
    format!(
        "Participants:   {}\nCatechists:     {}\nActive groups:  {}",
        stats.participant_count, stats.catechist_count, stats.active_group_count
    )
}

pub fn preview(preview: &TsvPreview) -> String {
    let mut out = vec![format!(
        "{} data rows, {} likely importable.",
        preview.data_rows, preview.likely_importable
    )];
    for issue in &preview.issues {
        out.push(format!("  line {}: {}", issue.line, issue.reason));
    }
    out.join("\n")
}

pub fn session(summary: &SessionSummary) -> String {
    if !summary.signed_in {
        return format!("Not signed in ({}).", summary.api_base_url);
    }
    let mut out = vec![format!(
        "Signed in as {} ({})",
        summary.subject.as_deref().unwrap_or("unknown user"),
        summary.role.as_deref().unwrap_or("no role claim")
    )];
    out.push(format!("  API:     {}", summary.api_base_url));
    if let Some(expires) = summary.expires_at {
        out.push(format!("  Expires: {}", expires.format("%Y-%m-%d %H:%M UTC")));
    }
    out.push(format!("  Admin:   {}", if summary.is_admin { "yes" } else { "no" }));
    out.join("\n")
}

pub fn profile(config: &PublicAppConfig) -> String {
    [
        "Configuration:".to_string(),
        format!("  API base URL:     {}", config.api_base_url),
        format!("  Keychain service: {}", config.vault_service),
        format!("  Import delay:     {} ms", config.import_close_delay_ms),
        format!("  User agent:       {}", config.user_agent),
        format!(
            "  Token in env:     {}",
            if config.has_api_token { "yes" } else { "no" }
        ),
    ]
    .join("\n")
}

fn history(groups: &[GroupSummary]) -> String {
    if groups.is_empty() {
        return "  (none)".into();
    }
    groups
        .iter()
        .map(|g| {
            format!(
                "  {:>5}  {} - Module {}  {}",
                g.id,
                group_label(g.start_date),
                g.module,
                g.catechist_name.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn field(label: &str, value: Option<&String>) -> String {
    let value = value.map(String::as_str).filter(|v| !v.is_empty()).unwrap_or("-");
    format!("  {:<18}{value}", format!("{label}:"))
}
