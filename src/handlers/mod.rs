pub mod application;
pub mod authorizer;
pub mod club;

use actix_web::web::{delete, get, post, put, scope, Data, ServiceConfig};

use crate::core::{ports::repository::Manager, services::workflow::Workflow};
use crate::impls::codec::json::JsonCodec;

pub type Service<M> = Data<Workflow<M, JsonCodec>>;

pub fn routes<M: Manager + 'static>(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("applications")
            .route("create_club", post().to(application::submit_create_club::<M>))
            .route("{kind}/mine", get().to(application::my_applications::<M>))
            .route("{kind}/pending", get().to(application::pending::<M>))
            .route("{kind}/{id}/approve", put().to(application::approve::<M>))
            .route("{kind}/{id}/reject", put().to(application::reject::<M>)),
    )
    .service(
        scope("clubs")
            .route("", get().to(club::list::<M>))
            .route("latest", get().to(club::latest::<M>))
            .route("count", get().to(club::count::<M>))
            .service(
                scope("{club_id}")
                    .route("", get().to(club::detail::<M>))
                    .route("members", get().to(club::members::<M>))
                    .route("members/me", delete().to(club::quit::<M>))
                    .route("favorite", put().to(club::favorite::<M>))
                    .route("favorite", delete().to(club::unfavorite::<M>))
                    .route("logo", put().to(club::update_logo::<M>))
                    .service(
                        scope("applications")
                            .route("join", post().to(application::submit_join::<M>))
                            .route("join", get().to(application::club_join_queue::<M>))
                            .route("update", post().to(application::submit_update::<M>)),
                    ),
            ),
    )
    .service(
        scope("categories")
            .route("", get().to(club::categories::<M>))
            .route("", post().to(club::create_category::<M>))
            .route("{category_id}/clubs", get().to(club::by_category::<M>)),
    )
    .service(scope("users/me").route("clubs", get().to(club::my_clubs::<M>)).route("favorites", get().to(club::my_favorites::<M>)));
}
