use crate::{
    config::AppConfig,
    error::Result,
    models::{NewUser, Role},
    password,
    repository::{NewNote, Repository},
};

const SAMPLE_NOTES: [(&str, &str, &str); 6] = [
    (
        "Human Heart Structure",
        "anatomy",
        "<h3>Overview</h3><p>The human heart is a muscular organ with four chambers.</p>",
    ),
    (
        "Skeletal System",
        "anatomy",
        "<h3>Overview</h3><p>The skeletal system provides structural support.</p>",
    ),
    (
        "Nervous System Basics",
        "anatomy",
        "<h3>Overview</h3><p>Central and peripheral nervous systems control body functions.</p>",
    ),
    (
        "Cardiac Cycle",
        "physiology",
        "<h3>Systole and Diastole</h3><p>Heart contraction and relaxation phases.</p>",
    ),
    (
        "Myocardial Infarction",
        "pathology",
        "<h3>Heart Attack</h3><p>Death of heart muscle due to blocked blood supply.</p>",
    ),
    (
        "Acute Coronary Syndrome",
        "cardiology",
        "<h3>Overview</h3><p>A set of conditions associated with sudden reduced blood flow to the heart.</p>",
    ),
];

/// The fixed set of notes inserted alongside the first admin.
pub fn sample_notes() -> Vec<NewNote> {
    SAMPLE_NOTES
        .iter()
        .map(|(title, category, content)| NewNote {
            title: title.to_string(),
            category: category.to_string(),
            content: content.to_string(),
            is_published: true,
            author_id: None,
        })
        .collect()
}

/// seed
///
/// Creates the distinguished admin (and, if configured, the sample notes) unless
/// an account with the admin email already exists. Safe to run on every boot.
pub async fn seed(repo: &dyn Repository, config: &AppConfig) -> Result<bool> {
    if repo
        .get_user_by_email(&config.seed_admin_email)
        .await?
        .is_some()
    {
        tracing::debug!("seed admin already present, skipping seed");
        return Ok(false);
    }

    let admin = NewUser {
        username: Some("admin_user".to_string()),
        email: config.seed_admin_email.clone(),
        password_hash: password::hash_password(&config.seed_admin_password)?,
        role: Role::Admin,
    };
    let notes = if config.seed_sample_notes {
        sample_notes()
    } else {
        Vec::new()
    };
    let note_count = notes.len();

    let created = repo.seed_admin(admin, notes).await?;
    if created {
        tracing::info!(
            email = %config.seed_admin_email,
            sample_notes = note_count,
            "seeded admin account"
        );
    }
    Ok(created)
}
