use crate::{
    api::{
        absences, audits, departements, exports, jours_feries, pointages, publications, salaires,
        societes, todos, users,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(users::create_user))
                            .route(web::get().to(users::list_users)),
                    )
                    // before /{id}, which would otherwise swallow it
                    .service(web::resource("/me").route(web::get().to(users::me)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::put().to(users::update_user))
                            .route(web::delete().to(users::delete_user)),
                    )
                    .service(
                        web::resource("/{id}/leave-balance")
                            .route(web::get().to(users::leave_balance)),
                    ),
            )
            .service(
                web::scope("/departements")
                    .service(
                        web::resource("")
                            .route(web::post().to(departements::create_departement))
                            .route(web::get().to(departements::list_departements)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(departements::get_departement))
                            .route(web::put().to(departements::update_departement))
                            .route(web::delete().to(departements::delete_departement)),
                    ),
            )
            .service(
                web::scope("/societes")
                    .service(
                        web::resource("")
                            .route(web::post().to(societes::create_societe))
                            .route(web::get().to(societes::list_societes)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(societes::get_societe))
                            .route(web::put().to(societes::update_societe))
                            .route(web::delete().to(societes::delete_societe)),
                    ),
            )
            .service(
                web::scope("/jours-feries")
                    .service(
                        web::resource("")
                            .route(web::post().to(jours_feries::create_jour_ferie))
                            .route(web::get().to(jours_feries::list_jours_feries)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(jours_feries::update_jour_ferie))
                            .route(web::delete().to(jours_feries::delete_jour_ferie)),
                    ),
            )
            .service(
                web::scope("/pointages")
                    .service(
                        web::resource("")
                            .route(web::post().to(pointages::create_pointage))
                            .route(web::get().to(pointages::list_pointages)),
                    )
                    .service(web::resource("/check-in").route(web::post().to(pointages::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(pointages::check_out)))
                    .service(web::resource("/summary").route(web::get().to(pointages::summary)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(pointages::update_pointage))
                            .route(web::delete().to(pointages::delete_pointage)),
                    ),
            )
            .service(
                web::scope("/absences")
                    .service(
                        web::resource("")
                            .route(web::post().to(absences::create_absence))
                            .route(web::get().to(absences::list_absences)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(absences::get_absence)))
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(absences::approve_absence)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(absences::reject_absence)),
                    )
                    .service(
                        web::resource("/{id}/cancel").route(web::put().to(absences::cancel_absence)),
                    ),
            )
            .service(
                web::scope("/salaires")
                    .service(web::resource("").route(web::get().to(salaires::list_salaires)))
                    .service(
                        web::resource("/generate").route(web::post().to(salaires::generate_salaire)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(salaires::get_salaire))
                            .route(web::put().to(salaires::update_salaire)),
                    ),
            )
            .service(
                web::scope("/todo-lists")
                    .service(
                        web::resource("")
                            .route(web::post().to(todos::create_list))
                            .route(web::get().to(todos::list_lists)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(todos::update_list))
                            .route(web::delete().to(todos::delete_list)),
                    )
                    .service(
                        web::resource("/{id}/tasks")
                            .route(web::post().to(todos::create_task))
                            .route(web::get().to(todos::list_tasks)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(todos::update_task))
                            .route(web::delete().to(todos::delete_task)),
                    )
                    .service(
                        web::resource("/{id}/status").route(web::put().to(todos::update_task_status)),
                    ),
            )
            .service(
                web::scope("/publications")
                    .service(
                        web::resource("")
                            .route(web::post().to(publications::create_publication))
                            .route(web::get().to(publications::list_publications)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(publications::get_publication))
                            .route(web::put().to(publications::update_publication))
                            .route(web::delete().to(publications::delete_publication)),
                    )
                    .service(
                        web::resource("/{id}/vote")
                            .route(web::put().to(publications::vote))
                            .route(web::delete().to(publications::unvote)),
                    ),
            )
            .service(web::resource("/audits").route(web::get().to(audits::list_audits)))
            .service(
                web::scope("/exports")
                    .service(
                        web::resource("/pointages").route(web::get().to(exports::export_pointages)),
                    )
                    .service(
                        web::resource("/overtime").route(web::get().to(exports::export_overtime)),
                    )
                    .service(
                        web::resource("/leave-balances")
                            .route(web::get().to(exports::export_leave_balances)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, stored in refresh_tokens)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ old refresh token revoked, new pair returned
