use axum::extract::FromRef;
use domain::SiteId;
use storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    // 部署级配置：本实例服务的站点
    pub site_id: SiteId,
}

impl FromRef<AppState> for Store {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
