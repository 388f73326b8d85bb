use crate::api::ApiClient;
use crate::errors::AppResult;
use crate::models::DashboardStats;

pub const STATS_PATH: &str = "/api/dashboard/stats";

pub async fn fetch_stats(api: &ApiClient) -> AppResult<DashboardStats> {
    api.get(STATS_PATH).await
}
