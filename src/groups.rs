use std::collections::HashSet;

use futures_util::future::try_join;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::catechists::CATECHISTS_PATH;
use crate::errors::{AppError, AppResult};
use crate::listing::{
    collate, project, Confirmation, ListController, LoadState, Mutation, Outcome, Picker,
};
use crate::models::{AddMember, Catechist, Group, GroupDetails, NewGroup, Participant};
use crate::participants::PARTICIPANTS_PATH;

pub const GROUPS_PATH: &str = "/api/groups";

fn group_path(id: i64) -> String {
    format!("{GROUPS_PATH}/{id}")
}

/// Group list plus the catechist dropdown used by the create form.
pub struct GroupsPage {
    api: ApiClient,
    list: ListController<Group>,
    catechists: Picker<Catechist>,
}

impl GroupsPage {
    pub async fn load(api: ApiClient) -> Self {
        let result = try_join(
            api.get::<Vec<Group>>(GROUPS_PATH),
            api.get::<Vec<Catechist>>(CATECHISTS_PATH),
        )
        .await;

        let mut list = ListController::new();
        let catechists = match result {
            Ok((groups, catechists)) => {
                list.finish_load(Ok(groups));
                catechists
            }
            Err(err) => {
                list.finish_load(Err(err));
                Vec::new()
            }
        };
        Self {
            api,
            list,
            catechists: Picker::new(catechists),
        }
    }

    pub fn state(&self) -> &LoadState {
        self.list.state()
    }

    pub fn list(&self) -> &ListController<Group> {
        &self.list
    }

    pub fn search(&mut self, query: impl Into<String>) {
        self.list.set_query(query);
    }

    pub fn visible(&mut self) -> Vec<&Group> {
        self.list.visible()
    }

    pub fn catechists(&self) -> &Picker<Catechist> {
        &self.catechists
    }

    pub fn catechists_mut(&mut self) -> &mut Picker<Catechist> {
        &mut self.catechists
    }

    pub fn last_error(&self) -> Option<&str> {
        self.list.last_error()
    }

    pub async fn create(&mut self, new: NewGroup) -> AppResult<Group> {
        let result: AppResult<Group> = match new.validate() {
            Ok(new) => self.api.post(GROUPS_PATH, &new).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(created) => {
                self.list.settle(Ok(Mutation::Added(created.clone())))?;
                Ok(created)
            }
            Err(err) => {
                self.list.record_error(&err);
                Err(err)
            }
        }
    }
}

/// Adds and removes members of one group. Candidates are every known
/// participant who is not already a member.
pub struct MembershipEditor {
    api: ApiClient,
    group_id: i64,
    state: LoadState,
    group: Option<GroupDetails>,
    roster: Vec<Participant>,
    last_error: Option<String>,
}

impl MembershipEditor {
    pub async fn load(api: ApiClient, group_id: i64) -> Self {
        let result = try_join(
            api.get::<GroupDetails>(&group_path(group_id)),
            api.get::<Vec<Participant>>(PARTICIPANTS_PATH),
        )
        .await;

        let (state, group, roster) = match result {
            Ok((mut group, roster)) => {
                sort_members(&mut group.members);
                (LoadState::Ready, Some(group), roster)
            }
            Err(err) => {
                let message = err.display_message();
                warn!(target: "groups", group_id, %message, "group page failed to load");
                (LoadState::Error(message), None, Vec::new())
            }
        };
        Self {
            api,
            group_id,
            state,
            group,
            roster,
            last_error: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn group(&self) -> Option<&GroupDetails> {
        self.group.as_ref()
    }

    pub fn members(&self) -> &[Participant] {
        self.group
            .as_ref()
            .map(|g| g.members.as_slice())
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn candidates(&self) -> Vec<&Participant> {
        let members: HashSet<i64> = self.members().iter().map(|m| m.id).collect();
        project(&self.roster, "")
            .into_iter()
            .filter(|p| !members.contains(&p.id))
            .collect()
    }

    pub async fn add_member(&mut self, participant_id: i64) -> AppResult<()> {
        let participant = match self.candidate(participant_id) {
            Ok(participant) => participant,
            Err(err) => {
                self.last_error = Some(err.display_message());
                return Err(err);
            }
        };

        let path = format!("{}/participants", group_path(self.group_id));
        let body = AddMember {
            confirmand_id: participant_id,
        };
        if let Err(err) = self.api.post_unit(&path, &body).await {
            self.last_error = Some(err.display_message());
            return Err(err);
        }

        info!(target: "groups", group_id = self.group_id, participant_id, "member added");
        self.last_error = None;
        if let Some(group) = self.group.as_mut() {
            group.members.push(participant);
            sort_members(&mut group.members);
        }
        Ok(())
    }

    pub async fn remove_member(
        &mut self,
        participant_id: i64,
        confirm: &dyn Confirmation,
    ) -> AppResult<Outcome> {
        let name = match self.members().iter().find(|m| m.id == participant_id) {
            Some(member) => member.full_name.clone(),
            None => {
                let err = AppError::Validation(format!(
                    "participant #{participant_id} is not a member of this group"
                ));
                self.last_error = Some(err.display_message());
                return Err(err);
            }
        };
        let prompt = format!("Remove {name} from this group?");
        if !confirm.confirm(&prompt).await {
            debug!(target: "groups", participant_id, "member removal cancelled");
            return Ok(Outcome::Cancelled);
        }

        let path = format!("{}/participants/{participant_id}", group_path(self.group_id));
        if let Err(err) = self.api.delete(&path).await {
            self.last_error = Some(err.display_message());
            return Err(err);
        }

        info!(target: "groups", group_id = self.group_id, participant_id, "member removed");
        self.last_error = None;
        if let Some(group) = self.group.as_mut() {
            group.members.retain(|m| m.id != participant_id);
        }
        Ok(Outcome::Applied)
    }

    fn candidate(&self, participant_id: i64) -> AppResult<Participant> {
        if self.group.is_none() {
            return Err(AppError::Validation("group details are not loaded".into()));
        }
        if self.members().iter().any(|m| m.id == participant_id) {
            return Err(AppError::Validation(format!(
                "participant #{participant_id} is already a member of this group"
            )));
        }
        self.roster
            .iter()
            .find(|p| p.id == participant_id)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("unknown participant #{participant_id}")))
    }
}

fn sort_members(members: &mut [Participant]) {
    members.sort_by(|a, b| collate(&a.full_name, &b.full_name));
}
