//! Seed the database with demo data.
//!
//! Creates a linked demo user, records an entitling purchase, and adds a
//! few leads across the pipeline so a fresh environment has something to
//! show. Safe to re-run: the user upsert and the purchase's order id keep
//! the seed idempotent, and leads are only created when the user has none.
//!
//! # Environment Variables
//!
//! - `LEADFLOW_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string

use leadflow_core::{Email, LeadStatus, SubjectId};
use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

use leadflow_server::db::{self, PgStore, Store, StoreError};
use leadflow_server::models::{NewLead, NewPurchase};
use leadflow_server::services::{LeadError, LeadService};

/// Subject id the demo user is linked under. Not a real provider subject;
/// sign-in with a real account goes through the email-linking path instead.
const DEMO_SUBJECT: &str = "user_seed_demo";

const DEMO_ORDER_ID: &str = "seed-0001";

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: LEADFLOW_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,

    /// The provided email failed validation.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store operation error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Lead creation error.
    #[error("Lead error: {0}")]
    Lead(#[from] LeadError),
}

/// Seed a demo user, one purchase, and a handful of leads.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the email is invalid,
/// or a write fails.
pub async fn run(email: &str) -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(email).map_err(|_| SeedError::InvalidEmail(email.to_owned()))?;

    let database_url = std::env::var("LEADFLOW_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| SeedError::MissingDatabaseUrl)?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    let subject = SubjectId::new(DEMO_SUBJECT);
    let user = store
        .upsert_user_identity(&subject, &email, Some("Demo User".to_owned()))
        .await?;
    info!(user_id = %user.id, email = %user.email, "Demo user ready");

    let purchase = NewPurchase {
        order_id: DEMO_ORDER_ID.to_owned(),
        user_id: Some(user.id),
        user_email: user.email.clone(),
        product_name: "Leadflow CRM".to_owned(),
        total_amount: 4900,
        currency: "USD".to_owned(),
        status: "paid".to_owned(),
        raw_payload: serde_json::json!({ "seed": true }),
    };
    match store.insert_purchase(purchase).await {
        Ok(recorded) => info!(order_id = %recorded.order_id, "Purchase recorded"),
        Err(StoreError::Conflict(_)) => info!("Purchase already seeded"),
        Err(e) => return Err(e.into()),
    }

    let existing = store.list_leads(user.id).await?;
    if !existing.is_empty() {
        info!(count = existing.len(), "Leads already present; skipping");
        return Ok(());
    }

    let leads = LeadService::new(&store);
    for fields in demo_leads() {
        let lead = leads.create(user.id, fields).await?;
        info!(lead_id = %lead.id, name = %lead.name, status = %lead.status, "Lead created");
    }

    info!("Seed complete!");
    Ok(())
}

fn demo_leads() -> Vec<NewLead> {
    vec![
        NewLead {
            name: Some("Priya Raman".to_owned()),
            company_name: Some("Northwind Consulting".to_owned()),
            email: Some("priya@northwind.example".to_owned()),
            phone: Some("+1 555 0100".to_owned()),
            status: Some(LeadStatus::Leads),
            source: Some("Referral".to_owned()),
            notes: Some("Asked for a quote on the annual plan.".to_owned()),
        },
        NewLead {
            name: Some("Marcus Webb".to_owned()),
            company_name: Some("Webb & Sons".to_owned()),
            email: Some("marcus@webbandsons.example".to_owned()),
            status: Some(LeadStatus::Contacted),
            source: Some("Conference".to_owned()),
            notes: Some("Followed up after the expo; call scheduled.".to_owned()),
            ..NewLead::default()
        },
        NewLead {
            name: Some("Elena Petrova".to_owned()),
            status: Some(LeadStatus::Lost),
            source: Some("Cold outreach".to_owned()),
            notes: Some("Went with a competitor.".to_owned()),
            ..NewLead::default()
        },
    ]
}
