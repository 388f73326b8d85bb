use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::future::try_join;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::errors::{AppError, AppResult};
use crate::import::{ImportOutcome, ImportWidget};
use crate::listing::{Confirmation, ListController, LoadState, Mutation, Outcome};
use crate::models::{AddSacrament, Participant, ParticipantDetails, ParticipantForm, Sacrament};

pub const PARTICIPANTS_PATH: &str = "/api/confirmands";
pub const SACRAMENTS_PATH: &str = "/api/sacraments";

fn participant_path(id: i64) -> String {
    format!("{PARTICIPANTS_PATH}/{id}")
}

/// The participants list page: search, add, edit, delete and bulk import.
pub struct ParticipantsPage {
    api: ApiClient,
    list: ListController<Participant>,
    import: ImportWidget,
}

impl ParticipantsPage {
    pub async fn load(api: ApiClient, import_close_delay: Duration) -> Self {
        let mut list = ListController::new();
        list.finish_load(api.get::<Vec<Participant>>(PARTICIPANTS_PATH).await);
        Self {
            api,
            list,
            import: ImportWidget::new(import_close_delay),
        }
    }

    pub fn state(&self) -> &LoadState {
        self.list.state()
    }

    pub fn list(&self) -> &ListController<Participant> {
        &self.list
    }

    pub fn import_widget(&self) -> &ImportWidget {
        &self.import
    }

    pub fn import_widget_mut(&mut self) -> &mut ImportWidget {
        &mut self.import
    }

    pub fn search(&mut self, query: impl Into<String>) {
        self.list.set_query(query);
    }

    pub fn visible(&mut self) -> Vec<&Participant> {
        self.list.visible()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.list.last_error()
    }

    pub async fn create(&mut self, form: ParticipantForm) -> AppResult<Participant> {
        let result: AppResult<Participant> = match form.validate() {
            Ok(form) => self.api.post(PARTICIPANTS_PATH, &form).await,
            Err(err) => Err(err),
        };
        self.commit(result, Mutation::Added)
    }

    pub async fn update(&mut self, id: i64, form: ParticipantForm) -> AppResult<Participant> {
        let result: AppResult<Participant> = match form.validate() {
            Ok(form) => self.api.put(&participant_path(id), &form).await,
            Err(err) => Err(err),
        };
        self.commit(result, Mutation::Updated)
    }

    /// Hard delete after an explicit confirmation.
    pub async fn delete(&mut self, id: i64, confirm: &dyn Confirmation) -> AppResult<Outcome> {
        let name = self
            .list
            .get(id)
            .map(|p| p.full_name.clone())
            .unwrap_or_else(|| format!("participant #{id}"));
        let prompt = format!("Delete {name}? This action cannot be undone.");
        if !confirm.confirm(&prompt).await {
            debug!(target: "participants", id, "delete cancelled");
            return Ok(Outcome::Cancelled);
        }

        let result = self
            .api
            .delete(&participant_path(id))
            .await
            .map(|()| Mutation::Removed(id));
        self.list.settle(result)?;
        Ok(Outcome::Applied)
    }

    pub async fn import(&mut self) -> AppResult<ImportOutcome> {
        self.import.submit(&self.api, &mut self.list).await
    }

    fn commit(
        &mut self,
        result: AppResult<Participant>,
        wrap: fn(Participant) -> Mutation<Participant>,
    ) -> AppResult<Participant> {
        match result {
            Ok(participant) => {
                self.list.settle(Ok(wrap(participant.clone())))?;
                Ok(participant)
            }
            Err(err) => {
                self.list.record_error(&err);
                Err(err)
            }
        }
    }
}

/// Profile, group history and sacrament checklist of one participant.
pub struct ParticipantDetailPage {
    api: ApiClient,
    participant_id: i64,
    state: LoadState,
    details: Option<ParticipantDetails>,
    catalogue: Vec<Sacrament>,
    last_error: Option<String>,
}

impl ParticipantDetailPage {
    /// Fetches the details and the sacrament catalogue concurrently; either
    /// failure puts the page in the error state.
    pub async fn load(api: ApiClient, participant_id: i64) -> Self {
        let details_path = format!("{}/details", participant_path(participant_id));
        let result = try_join(
            api.get::<ParticipantDetails>(&details_path),
            api.get::<Vec<Sacrament>>(SACRAMENTS_PATH),
        )
        .await;

        let (state, details, catalogue) = match result {
            Ok((details, catalogue)) => (LoadState::Ready, Some(details), catalogue),
            Err(err) => {
                let message = err.display_message();
                warn!(
                    target: "participants",
                    participant_id,
                    %message,
                    "detail page failed to load"
                );
                (LoadState::Error(message), None, Vec::new())
            }
        };
        Self {
            api,
            participant_id,
            state,
            details,
            catalogue,
            last_error: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn details(&self) -> Option<&ParticipantDetails> {
        self.details.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn catalogue(&self) -> &[Sacrament] {
        &self.catalogue
    }

    pub fn completed_ids(&self) -> BTreeSet<i64> {
        self.details
            .as_ref()
            .map(|d| d.sacraments.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    /// Every sacrament in the catalogue with its completion flag.
    pub fn checklist(&self) -> Vec<(&Sacrament, bool)> {
        let completed = self.completed_ids();
        self.catalogue
            .iter()
            .map(|s| (s, completed.contains(&s.id)))
            .collect()
    }

    /// Marks a sacrament as completed or not. The checklist changes only
    /// after the server accepts the change.
    pub async fn toggle_sacrament(&mut self, sacrament_id: i64, completed: bool) -> AppResult<()> {
        let sacrament = self
            .catalogue
            .iter()
            .find(|s| s.id == sacrament_id)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("unknown sacrament #{sacrament_id}")))?;
        let already = self.completed_ids().contains(&sacrament_id);
        if self.details.is_none() {
            return Err(AppError::Validation("participant details are not loaded".into()));
        }
        if already == completed {
            return Ok(());
        }

        let path = format!("{}/sacraments", participant_path(self.participant_id));
        let result = if completed {
            self.api
                .post_unit(&path, &AddSacrament { sacrament_id })
                .await
        } else {
            self.api.delete(&format!("{path}/{sacrament_id}")).await
        };

        if let Err(err) = result {
            let message = format!(
                "Error updating sacrament: {}. Please refresh and try again.",
                err.display_message()
            );
            warn!(target: "participants", sacrament_id, %message, "sacrament toggle failed");
            self.last_error = Some(message);
            return Err(err);
        }

        self.last_error = None;
        if let Some(details) = self.details.as_mut() {
            if completed {
                details.sacraments.push(sacrament);
            } else {
                details.sacraments.retain(|s| s.id != sacrament_id);
            }
        }
        Ok(())
    }
}
