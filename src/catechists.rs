use crate::api::ApiClient;
use crate::errors::AppResult;
use crate::listing::{ListController, LoadState, Mutation};
use crate::models::{Catechist, CatechistDetails, NewCatechist};

pub const CATECHISTS_PATH: &str = "/api/catechists";

pub struct CatechistsPage {
    api: ApiClient,
    list: ListController<Catechist>,
}

impl CatechistsPage {
    pub async fn load(api: ApiClient) -> Self {
        let mut list = ListController::new();
        list.finish_load(api.get::<Vec<Catechist>>(CATECHISTS_PATH).await);
        Self { api, list }
    }

    pub fn state(&self) -> &LoadState {
        self.list.state()
    }

    pub fn list(&self) -> &ListController<Catechist> {
        &self.list
    }

    pub fn search(&mut self, query: impl Into<String>) {
        self.list.set_query(query);
    }

    pub fn visible(&mut self) -> Vec<&Catechist> {
        self.list.visible()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.list.last_error()
    }

    pub async fn create(&mut self, new: NewCatechist) -> AppResult<Catechist> {
        let result: AppResult<Catechist> = match new.validate() {
            Ok(new) => self.api.post(CATECHISTS_PATH, &new).await,
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

pub async fn fetch_details(api: &ApiClient, id: i64) -> AppResult<CatechistDetails> {
    api.get(&format!("{CATECHISTS_PATH}/{id}/details")).await
}
