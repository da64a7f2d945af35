//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are async and only ever await database work, so worker threads never block on them.
use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use market_engine::{
    db_types::NewDispute,
    listing_objects::{ListingResult, LocationResult},
    traits::{CodeIssue, HandoverDatabase},
    HandoverApiError,
    HandoverFlowApi,
};
use serde_json::json;

use crate::{
    auth::AuthenticatedUser,
    config::ServerConfig,
    data_objects::{
        CancelParams,
        DisputeParams,
        JsonResponse,
        NewListingParams,
        ProposeLocationsParams,
        SelectLocationParams,
        VerifyOtpParams,
    },
    errors::ServerError,
};

// Actix-web cannot handle generics in handlers, so routes are registered manually via the
// `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Listings  ----------------------------------------------------

route!(create_listing => Post "/products" impl HandoverDatabase);
/// Creates a new listing in the `Available` state. The caller becomes its seller.
pub async fn create_listing<B: HandoverDatabase>(
    user: AuthenticatedUser,
    body: web::Json<NewListingParams>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create listing for {}", user.id());
    let params = body.into_inner();
    if params.title.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("A listing needs a title".to_string()));
    }
    let listing =
        api.create_listing(market_engine::db_types::NewListing::new(user.id().clone(), params.title)).await?;
    Ok(HttpResponse::Created().json(ListingResult::from(listing)))
}

route!(get_product => Get "/products/{id}" impl HandoverDatabase);
/// Lock-free read of a listing for display. May trail an in-flight transaction by a moment.
pub async fn get_product<B: HandoverDatabase>(
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ GET product #{id}");
    let listing = api.listing(id).await?.ok_or_else(|| HandoverApiError::not_found(id))?;
    Ok(HttpResponse::Ok().json(ListingResult::from(listing)))
}

route!(reserve => Post "/products/{id}/reserve" impl HandoverDatabase);
pub async fn reserve<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST reserve product #{id} for {}", user.id());
    let listing = api.reserve(id, user.id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": listing.status, "reserved_by": listing.reserved_by })))
}

//----------------------------------------------  Locations ----------------------------------------------------

route!(propose_locations => Post "/locations/{id}" impl HandoverDatabase);
/// The seller proposes the candidate meeting set. Re-proposing replaces the previous set.
pub async fn propose_locations<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<ProposeLocationsParams>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST propose locations for product #{id}");
    let candidates = body.into_inner().into_candidates();
    let listing = api.propose_locations(id, user.id(), &candidates).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": listing.status, "selectedLocation": Option::<String>::None })))
}

route!(get_locations => Get "/locations/{id}" impl HandoverDatabase);
pub async fn get_locations<B: HandoverDatabase>(
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ GET locations for product #{id}");
    let locations = api.locations(id).await?.into_iter().map(LocationResult::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(locations))
}

route!(select_location => Post "/locations/{id}/select" impl HandoverDatabase);
pub async fn select_location<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<SelectLocationParams>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST select location for product #{id}");
    let (listing, selected) = api.select_location(id, user.id(), body.location).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": listing.status, "selectedLocation": selected.place })))
}

//----------------------------------------------    OTP     ----------------------------------------------------

route!(confirm_meet => Post "/products/{id}/confirm-meet" impl HandoverDatabase);
/// The buyer signals they have arrived at the meeting point. Issues the one-time exchange code,
/// or re-acknowledges the live one; the plaintext appears in this response and nowhere else.
pub async fn confirm_meet<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST confirm-meet for product #{id}");
    let issue = api.request_exchange_code(id, user.id(), config.otp_ttl).await?;
    let expires_in = (issue.expires_at() - Utc::now()).num_seconds().max(0);
    let body = match issue {
        CodeIssue::Issued { code, .. } => json!({ "otp": code.reveal(), "expiresIn": expires_in }),
        CodeIssue::AlreadyIssued { .. } => json!({ "message": "OTP already generated", "expiresIn": expires_in }),
    };
    Ok(HttpResponse::Ok().json(body))
}

route!(verify_otp => Post "/otp/verify" impl HandoverDatabase);
/// The seller submits the code the buyer read out. A match settles the listing as sold.
pub async fn verify_otp<B: HandoverDatabase>(
    user: AuthenticatedUser,
    body: web::Json<VerifyOtpParams>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST verify otp for product #{}", params.product_id);
    api.verify_exchange_code(params.product_id, user.id(), &params.otp).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

//---------------------------------------------- Reschedule ----------------------------------------------------

route!(reschedule => Post "/products/{id}/reschedule" impl HandoverDatabase);
/// Either party may call this. A first call records a request; the counterparty calling while the
/// request is pending confirms it and drops the pair back to `Reserved`.
pub async fn reschedule<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST reschedule for product #{id}");
    let outcome = api.request_reschedule(id, user.id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": outcome })))
}

route!(reject_reschedule => Post "/products/{id}/reschedule/reject" impl HandoverDatabase);
pub async fn reject_reschedule<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST reject reschedule for product #{id}");
    let outcome = api.reject_reschedule(id, user.id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "action": outcome })))
}

//----------------------------------------------  Cancel / Dispute  --------------------------------------------

route!(cancel => Post "/products/{id}/cancel" impl HandoverDatabase);
pub async fn cancel<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: Option<web::Json<CancelParams>>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST cancel reservation on product #{id}");
    let reason = body.map(|b| b.into_inner().reason).unwrap_or_default();
    let record = api.cancel_reservation(id, user.id(), reason).await?;
    Ok(HttpResponse::Ok().json(json!({ "penaltyAppliedTo": record.fault, "reason": record.reason })))
}

route!(dispute => Post "/products/{id}/dispute" impl HandoverDatabase);
pub async fn dispute<B: HandoverDatabase>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<DisputeParams>,
    api: web::Data<HandoverFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST dispute on product #{id}");
    let params = body.into_inner();
    let dispute = NewDispute { reason: params.reason, details: params.details, evidence_url: params.evidence_url };
    api.create_dispute(id, user.id(), dispute).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Dispute recorded. A moderator will review it.")))
}
