use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::catechists::{self, CatechistsPage};
use crate::commands::*;
use crate::dashboard;
use crate::errors::{AppError, AppResult};
use crate::groups::{GroupsPage, MembershipEditor};
use crate::import::preview_tsv;
use crate::listing::{Confirmation, FixedAnswer, Outcome, Picker};
use crate::models::{Named, NewCatechist, NewGroup, Participant, ParticipantForm};
use crate::output::{self, emit};
use crate::participants::{ParticipantDetailPage, ParticipantsPage};
use crate::session::AppContext;

/// Asks on stderr and reads the answer from stdin; anything but `y`/`yes`
/// declines.
pub struct PromptConfirmation;

#[async_trait]
impl Confirmation for PromptConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = tokio::io::stderr();
        if stderr
            .write_all(format!("{prompt} [y/N] ").as_bytes())
            .await
            .is_err()
        {
            return false;
        }
        let _ = stderr.flush().await;
        match read_line().await {
            Ok(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

async fn read_line() -> AppResult<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli, ctx: &mut AppContext) -> AppResult<()> {
    let json = cli.json;
    let confirm: Box<dyn Confirmation> = if cli.yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(PromptConfirmation)
    };

    match cli.command {
        Commands::Login(args) => cmd_login(ctx, args, json).await,
        Commands::Logout => {
            ctx.sign_out()?;
            emit(json, &json!({ "signed_in": false }), || "Signed out.".into())
        }
        Commands::Whoami => {
            let summary = ctx.summary();
            let profile = ctx.config().public_profile();
            let value = json!({ "session": summary, "config": profile });
            emit(json, &value, || {
                format!("{}\n\n{}", output::session(&summary), output::profile(&profile))
            })
        }
        Commands::Stats => {
            ctx.require_session()?;
            let stats = dashboard::fetch_stats(ctx.api()).await?;
            emit(json, &stats, || output::stats(&stats))
        }
        Commands::Participants(cmd) => participants(ctx, cmd, confirm.as_ref(), json).await,
        Commands::Catechists(cmd) => catechists(ctx, cmd, json).await,
        Commands::Groups(cmd) => groups(ctx, cmd, confirm.as_ref(), json).await,
    }
}

async fn cmd_login(ctx: &mut AppContext, args: LoginArgs, json: bool) -> AppResult<()> {
    let token = match args.token {
        Some(token) => token,
        None => {
            eprint!("Token: ");
            read_line().await?
        }
    };
    ctx.sign_in(SecretString::from(token))?;
    let summary = ctx.summary();
    emit(json, &summary, || output::session(&summary))
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

async fn participants(
    ctx: &AppContext,
    cmd: ParticipantsCmd,
    confirm: &dyn Confirmation,
    json: bool,
) -> AppResult<()> {
    let close_delay = ctx.config().import_close_delay();
    match cmd {
        ParticipantsCmd::List(args) => {
            ctx.require_session()?;
            let mut page = ParticipantsPage::load(ctx.api().clone(), close_delay).await;
            page.state().check()?;
            page.search(args.search.unwrap_or_default());
            let visible = page.visible();
            emit(json, &visible, || output::participant_rows(&visible))
        }
        ParticipantsCmd::Show { id } => {
            ctx.require_session()?;
            let page = ParticipantDetailPage::load(ctx.api().clone(), id).await;
            page.state().check()?;
            let details = page
                .details()
                .ok_or_else(|| AppError::Load(format!("participant #{id} not found")))?;
            let checklist = page.checklist();
            let value = json!({
                "participant": details,
                "checklist": checklist
                    .iter()
                    .map(|(s, done)| json!({ "id": s.id, "name": s.name, "completed": done }))
                    .collect::<Vec<_>>(),
            });
            emit(json, &value, || output::participant_details(details, &checklist))
        }
        ParticipantsCmd::Add(args) => {
            ctx.require_admin()?;
            let form = ParticipantForm {
                full_name: args.name,
                email: args.email,
                phone_number: args.phone,
                birth_date: args.birth_date,
                address: args.address,
                marital_status: args.marital_status,
                father_name: args.family.father_name,
                mother_name: args.family.mother_name,
                baptism_church: args.family.baptism_church,
                communion_church: args.family.communion_church,
            };
            let mut page = ParticipantsPage::load(ctx.api().clone(), close_delay).await;
            page.state().check()?;
            let created = page.create(form).await?;
            emit(json, &created, || format!("Added {}", output::participant_line(&created)))
        }
        ParticipantsCmd::Edit { id, fields } => {
            ctx.require_admin()?;
            let mut page = ParticipantsPage::load(ctx.api().clone(), close_delay).await;
            page.state().check()?;
            let current = page
                .list()
                .get(id)
                .ok_or_else(|| AppError::Validation(format!("participant #{id} not found")))?;
            let form = edited_form(current, fields)?;
            let updated = page.update(id, form).await?;
            emit(json, &updated, || format!("Updated {}", output::participant_line(&updated)))
        }
        ParticipantsCmd::Delete { id } => {
            ctx.require_admin()?;
            let mut page = ParticipantsPage::load(ctx.api().clone(), close_delay).await;
            page.state().check()?;
            let outcome = page.delete(id, confirm).await?;
            outcome_message(json, id, outcome, "Deleted participant")
        }
        ParticipantsCmd::Import(args) => {
            if args.preview {
                let content = tokio::fs::read_to_string(&args.file).await?;
                let preview = preview_tsv(&content)?;
                return emit(json, &preview, || output::preview(&preview));
            }
            ctx.require_admin()?;
            let mut page = ParticipantsPage::load(ctx.api().clone(), close_delay).await;
            page.state().check()?;
            page.import_widget_mut().select_path(&args.file).await?;
            let outcome = page.import().await?;
            emit(json, &outcome, || outcome.message.clone())
        }
        ParticipantsCmd::Sacrament(args) => {
            ctx.require_admin()?;
            let mut page = ParticipantDetailPage::load(ctx.api().clone(), args.id).await;
            page.state().check()?;
            let mut picker = Picker::new(page.catalogue().to_vec());
            let sacrament = picker.resolve(&args.sacrament)?.clone();
            let completed = !args.undo;
            if let Err(err) = page.toggle_sacrament(sacrament.id, completed).await {
                return Err(match page.last_error() {
                    Some(message) => AppError::Load(message.to_string()),
                    None => err,
                });
            }
            let value = json!({ "sacrament": sacrament, "completed": completed });
            emit(json, &value, || {
                let state = if completed { "completed" } else { "not completed" };
                format!("{} marked as {state}.", sacrament.name)
            })
        }
    }
}

fn edited_form(
    current: &Participant,
    fields: ParticipantEditArgs,
) -> AppResult<ParticipantForm> {
    let mut form = match (ParticipantForm::from_participant(current), fields.birth_date) {
        (Ok(form), _) => form,
        (Err(_), Some(birth_date)) => {
            let mut patched = current.clone();
            patched.birth_date = Some(birth_date);
            ParticipantForm::from_participant(&patched)?
        }
        (Err(err), None) => return Err(err),
    };
    if let Some(name) = fields.name {
        form.full_name = name;
    }
    if let Some(email) = fields.email {
        form.email = email;
    }
    if let Some(phone) = fields.phone {
        form.phone_number = phone;
    }
    if let Some(birth_date) = fields.birth_date {
        form.birth_date = birth_date;
    }
    if let Some(address) = fields.address {
        form.address = address;
    }
    if let Some(status) = fields.marital_status {
        form.marital_status = status;
    }
    let family = fields.family;
    for (slot, value) in [
        (&mut form.father_name, family.father_name),
        (&mut form.mother_name, family.mother_name),
        (&mut form.baptism_church, family.baptism_church),
        (&mut form.communion_church, family.communion_church),
    ] {
        if value.is_some() {
            *slot = value;
        }
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// Catechists
// ---------------------------------------------------------------------------

async fn catechists(ctx: &AppContext, cmd: CatechistsCmd, json: bool) -> AppResult<()> {
    match cmd {
        CatechistsCmd::List(args) => {
            ctx.require_session()?;
            let mut page = CatechistsPage::load(ctx.api().clone()).await;
            page.state().check()?;
            page.search(args.search.unwrap_or_default());
            let visible = page.visible();
            emit(json, &visible, || output::catechist_rows(&visible))
        }
        CatechistsCmd::Show { id } => {
            ctx.require_session()?;
            let details = catechists::fetch_details(ctx.api(), id).await?;
            emit(json, &details, || output::catechist_details(&details))
        }
        CatechistsCmd::Add { name, inactive } => {
            ctx.require_admin()?;
            let mut page = CatechistsPage::load(ctx.api().clone()).await;
            page.state().check()?;
            let created = page
                .create(NewCatechist {
                    full_name: name,
                    currently_active: !inactive,
                })
                .await?;
            emit(json, &created, || {
                format!("Added catechist #{} {}", created.id, created.full_name)
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

async fn groups(
    ctx: &AppContext,
    cmd: GroupsCmd,
    confirm: &dyn Confirmation,
    json: bool,
) -> AppResult<()> {
    match cmd {
        GroupsCmd::List(args) => {
            ctx.require_session()?;
            let mut page = GroupsPage::load(ctx.api().clone()).await;
            page.state().check()?;
            page.search(args.search.unwrap_or_default());
            let visible = page.visible();
            emit(json, &visible, || output::group_rows(&visible))
        }
        GroupsCmd::Show { id } => {
            ctx.require_session()?;
            let editor = MembershipEditor::load(ctx.api().clone(), id).await;
            editor.state().check()?;
            let group = editor
                .group()
                .ok_or_else(|| AppError::Load(format!("group #{id} not found")))?;
            let candidates = editor.candidates().len();
            emit(json, group, || output::group_details(group, candidates))
        }
        GroupsCmd::Add(args) => {
            ctx.require_admin()?;
            let mut page = GroupsPage::load(ctx.api().clone()).await;
            page.state().check()?;
            let catechist_id = match &args.catechist {
                Some(input) => Some(page.catechists_mut().resolve(input)?.id),
                None => None,
            };
            let created = page
                .create(NewGroup {
                    module: args.module,
                    catechist_id,
                    day_of_the_week: args.day,
                    group_link: args.link,
                    start_date: args.start,
                    end_date: args.end,
                })
                .await?;
            emit(json, &created, || {
                format!("Created group #{} {}", created.id, created.display_name())
            })
        }
        GroupsCmd::AddMember {
            group_id,
            participant,
        } => {
            ctx.require_admin()?;
            let mut editor = MembershipEditor::load(ctx.api().clone(), group_id).await;
            editor.state().check()?;
            let candidates: Vec<Participant> = editor.candidates().into_iter().cloned().collect();
            let member = Picker::new(candidates).resolve(&participant)?.clone();
            editor.add_member(member.id).await?;
            emit(json, &member, || {
                format!("Added {} to group #{group_id}.", member.full_name)
            })
        }
        GroupsCmd::RemoveMember {
            group_id,
            participant,
        } => {
            ctx.require_admin()?;
            let mut editor = MembershipEditor::load(ctx.api().clone(), group_id).await;
            editor.state().check()?;
            let member = Picker::new(editor.members().to_vec())
                .resolve(&participant)?
                .clone();
            let outcome = editor.remove_member(member.id, confirm).await?;
            outcome_message(json, member.id, outcome, "Removed participant")
        }
    }
}

fn outcome_message(json: bool, id: i64, outcome: Outcome, verb: &str) -> AppResult<()> {
    let applied = outcome == Outcome::Applied;
    emit(json, &json!({ "id": id, "applied": applied }), || {
        if applied {
            format!("{verb} #{id}.")
        } else {
            "Cancelled.".into()
        }
    })
}
