//! Paginated user listing.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::AppState;
use crate::error::Result;
use crate::user::UserPage;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

pub async fn handler(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<UserPage>> {
    Ok(Json(
        state
            .users
            .get_all_users(pagination.limit, pagination.page)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::user::UserPage;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    async fn page(state: crate::AppState, token: &str, path: &str) -> UserPage {
        let response =
            make_request(app(state), Method::GET, path, Some(token), String::new())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn pages_are_disjoint_and_ordered() {
        let (state, _) = test_state();
        let mut first_id = 0;
        for i in 1..=3 {
            let id = state
                .users
                .register(
                    &format!("user{i}"),
                    &format!("user{i}@x.com"),
                    "password-1",
                )
                .await
                .unwrap();
            if i == 1 {
                first_id = id;
            }
        }
        let token = state.token.create(first_id).unwrap();

        let first =
            page(state.clone(), &token, "/users?limit=2&page=1").await;
        let second =
            page(state.clone(), &token, "/users?limit=2&page=2").await;

        assert_eq!(first.users.len(), 2);
        assert_eq!(second.users.len(), 1);
        assert_eq!(first.total, 3);
        assert!(first.users[0].id < first.users[1].id);
        assert!(first.users.iter().all(|u| {
            second.users.iter().all(|other| other.id != u.id)
        }));
    }

    #[tokio::test]
    async fn defaults_apply_without_query() {
        let (state, _) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let listing = page(state, &token, "/users").await;
        assert_eq!(listing.limit, crate::user::DEFAULT_PAGE_SIZE);
        assert_eq!(listing.page, 1);
        assert_eq!(listing.users.len(), 1);
    }
}
