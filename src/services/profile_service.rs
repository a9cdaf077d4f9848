use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::ensure_owner;
use crate::database::models::{Education, Experience, Post, Profile, ProfileView, User, UserSummary};
use crate::database::repository::{from_document, to_document};
use crate::database::{Filter, Patch, Repository, StoreError, UpdateOptions};
use crate::error::{is_blank, validate, ApiError, FieldError};
use crate::state::AppState;

use super::embedded::{EmbeddedEditor, EmbeddedList};

/// Sparse create-or-update payload for `POST /api/profile`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    /// Comma-separated list
    pub skills: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "githubUserName", alias = "githubusername")]
    pub github_user_name: Option<String>,
    pub youtube: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
}

impl ProfileInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if is_blank(self.status.as_deref()) {
            errors.push(FieldError::new("status", "Status is required"));
        }
        if is_blank(self.skills.as_deref()) {
            errors.push(FieldError::new("skills", "Skills is required"));
        }
        validate(errors)
    }

    /// Assignments for every supplied field; absent or blank values are
    /// left out so an update never clears what is already stored
    pub fn field_set(&self) -> Patch {
        let mut patch = Patch::new();

        let scalars = [
            ("company", &self.company),
            ("website", &self.website),
            ("location", &self.location),
            ("status", &self.status),
            ("bio", &self.bio),
            ("githubUserName", &self.github_user_name),
        ];
        for (path, value) in scalars {
            if let Some(value) = present(value) {
                patch.push(path, value);
            }
        }

        if let Some(skills) = present(&self.skills) {
            patch.push("skills", parse_skills(skills));
        }

        let social = [
            ("youtube", &self.youtube),
            ("twitter", &self.twitter),
            ("facebook", &self.facebook),
            ("linkedin", &self.linkedin),
            ("instagram", &self.instagram),
        ];
        for (name, value) in social {
            if let Some(value) = present(value) {
                patch.push(format!("social.{}", name), value);
            }
        }

        patch
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperienceInput {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub current: Option<bool>,
    pub description: Option<String>,
}

impl ExperienceInput {
    fn into_entry(self) -> Result<Experience, ApiError> {
        let mut errors = Vec::new();
        if is_blank(self.title.as_deref()) {
            errors.push(FieldError::new("title", "Title is required"));
        }
        if is_blank(self.company.as_deref()) {
            errors.push(FieldError::new("company", "Company is required"));
        }
        if is_blank(self.from.as_deref()) {
            errors.push(FieldError::new("from", "From date is required"));
        }
        validate(errors)?;

        Ok(Experience {
            id: Uuid::new_v4().to_string(),
            title: self.title.unwrap_or_default(),
            company: self.company.unwrap_or_default(),
            location: present(&self.location).map(str::to_string),
            from: self.from.unwrap_or_default(),
            to: present(&self.to).map(str::to_string),
            current: self.current.unwrap_or(false),
            description: present(&self.description).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EducationInput {
    pub school: Option<String>,
    pub degree: Option<String>,
    #[serde(rename = "fieldOfStudy", alias = "fieldofstudy")]
    pub field_of_study: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub current: Option<bool>,
    pub description: Option<String>,
}

impl EducationInput {
    fn into_entry(self) -> Result<Education, ApiError> {
        let mut errors = Vec::new();
        if is_blank(self.school.as_deref()) {
            errors.push(FieldError::new("school", "School is required"));
        }
        if is_blank(self.degree.as_deref()) {
            errors.push(FieldError::new("degree", "Degree is required"));
        }
        if is_blank(self.field_of_study.as_deref()) {
            errors.push(FieldError::new("fieldOfStudy", "Field of study is required"));
        }
        if is_blank(self.from.as_deref()) {
            errors.push(FieldError::new("from", "From date is required"));
        }
        validate(errors)?;

        Ok(Education {
            id: Uuid::new_v4().to_string(),
            school: self.school.unwrap_or_default(),
            degree: self.degree.unwrap_or_default(),
            field_of_study: self.field_of_study.unwrap_or_default(),
            from: self.from.unwrap_or_default(),
            to: present(&self.to).map(str::to_string),
            current: self.current.unwrap_or(false),
            description: present(&self.description).map(str::to_string),
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Split on commas and trim each element; order and duplicates are kept
pub fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',').map(|skill| skill.trim().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOutcome {
    Created(Profile),
    Updated(Profile),
}

impl ProfileOutcome {
    pub fn profile(&self) -> &Profile {
        match self {
            ProfileOutcome::Created(profile) | ProfileOutcome::Updated(profile) => profile,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            ProfileOutcome::Created(profile) | ProfileOutcome::Updated(profile) => profile,
        }
    }
}

/// Profile reads, the create-or-update merge, and experience/education
/// edits. Every mutation targets the caller's own profile by `user_id`.
pub struct ProfileService {
    profiles: Repository<Profile>,
    users: Repository<User>,
    posts: Repository<Post>,
    editor: EmbeddedEditor,
}

impl ProfileService {
    pub fn new(state: &AppState) -> Self {
        Self {
            profiles: state.profiles(),
            users: state.users(),
            posts: state.posts(),
            editor: EmbeddedEditor::new(state.store.clone()),
        }
    }

    fn own(user_id: &str) -> Filter {
        Filter::eq("user_id", user_id)
    }

    /// Create the caller's profile or merge the supplied fields into it, as
    /// one atomic upsert keyed on `user_id`
    pub async fn upsert(&self, user_id: &str, input: &ProfileInput) -> Result<ProfileOutcome, ApiError> {
        input.validate()?;

        let seed = Profile::seed(Uuid::new_v4().to_string(), user_id.to_string(), Utc::now());
        let patch = input.field_set().on_insert(to_document(&seed)?);
        let options = UpdateOptions {
            upsert: true,
            return_updated: true,
        };

        let outcome = self
            .profiles
            .store()
            .update(self.profiles.collection(), &Self::own(user_id), &patch, options)
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Server Error"))?;

        let profile: Profile = from_document(outcome.document)?;
        if outcome.inserted {
            info!("Created profile {} for user {}", profile.id, user_id);
            Ok(ProfileOutcome::Created(profile))
        } else {
            debug!("Updated profile {} for user {}", profile.id, user_id);
            Ok(ProfileOutcome::Updated(profile))
        }
    }

    pub async fn me(&self, user_id: &str) -> Result<ProfileView, ApiError> {
        let profile = self
            .profiles
            .select_one(&Self::own(user_id))
            .await?
            .ok_or_else(|| ApiError::not_found("There is no profile for this user"))?;
        self.view(profile).await
    }

    pub async fn list(&self) -> Result<Vec<ProfileView>, ApiError> {
        let mut profiles = self.profiles.select_any(&Filter::all()).await?;
        profiles.sort_by(|a, b| b.date.cmp(&a.date));

        let mut views = Vec::with_capacity(profiles.len());
        for profile in profiles {
            views.push(self.view(profile).await?);
        }
        Ok(views)
    }

    pub async fn by_user(&self, user_id: &str) -> Result<ProfileView, ApiError> {
        let profile = self
            .profiles
            .select_one(&Self::own(user_id))
            .await?
            .ok_or_else(|| ApiError::not_found("Profile not found"))?;
        self.view(profile).await
    }

    async fn view(&self, profile: Profile) -> Result<ProfileView, ApiError> {
        let user = self
            .users
            .select_id(&profile.user_id)
            .await?
            .map(|user| UserSummary::from(&user));
        Ok(ProfileView { profile, user })
    }

    /// Remove the caller's posts, profile and account
    pub async fn delete_account(&self, user_id: &str) -> Result<(), ApiError> {
        if let Some(profile) = self.profiles.select_one(&Self::own(user_id)).await? {
            ensure_owner(user_id, &profile)?;
        }

        let posts = self.posts.delete_any(&Filter::eq("user_id", user_id)).await?;
        let profiles = self.profiles.delete_any(&Self::own(user_id)).await?;
        match self.users.delete(user_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => debug!("User {} already removed", user_id),
            Err(err) => return Err(err.into()),
        }

        info!("Deleted user {} ({} posts, {} profiles)", user_id, posts, profiles);
        Ok(())
    }

    pub async fn add_experience(&self, user_id: &str, input: ExperienceInput) -> Result<Profile, ApiError> {
        let entry = input.into_entry()?;
        self.editor.add(EmbeddedList::Experience, &Self::own(user_id), &entry).await
    }

    pub async fn remove_experience(&self, user_id: &str, exp_id: &str) -> Result<Profile, ApiError> {
        self.editor.remove(EmbeddedList::Experience, &Self::own(user_id), exp_id).await
    }

    pub async fn add_education(&self, user_id: &str, input: EducationInput) -> Result<Profile, ApiError> {
        let entry = input.into_entry()?;
        self.editor.add(EmbeddedList::Education, &Self::own(user_id), &entry).await
    }

    pub async fn remove_education(&self, user_id: &str, edu_id: &str) -> Result<Profile, ApiError> {
        self.editor.remove(EmbeddedList::Education, &Self::own(user_id), edu_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn input(status: &str, skills: &str) -> ProfileInput {
        ProfileInput {
            status: Some(status.to_string()),
            skills: Some(skills.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn skills_are_trimmed_in_order() {
        assert_eq!(parse_skills("node, react, sql"), vec!["node", "react", "sql"]);
        assert_eq!(parse_skills(" rust ,go,rust"), vec!["rust", "go", "rust"]);
    }

    #[test]
    fn validation_lists_every_missing_field() {
        let err = ProfileInput::default().validate().unwrap_err();
        match err {
            ApiError::ValidationError(errors) => {
                let params: Vec<_> = errors.iter().map(|e| e.param.as_str()).collect();
                assert_eq!(params, vec!["status", "skills"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(input("  ", "x").validate().is_err());
    }

    #[test]
    fn field_set_is_sparse() {
        let payload = ProfileInput {
            company: Some(String::new()),
            twitter: Some("@me".into()),
            ..input("Developer", "a,b")
        };
        let patch = payload.field_set();
        let paths: Vec<_> = patch.assignments().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["status", "skills", "social.twitter"]);
    }

    #[tokio::test]
    async fn creates_then_updates_sparsely() {
        let ctx = TestContext::new();
        let service = ProfileService::new(&ctx.state);

        let created = service
            .upsert("u1", &ProfileInput {
                company: Some("Acme".into()),
                youtube: Some("yt".into()),
                ..input("Developer", "node, react, sql")
            })
            .await
            .unwrap();
        assert!(matches!(created, ProfileOutcome::Created(_)));
        assert_eq!(created.profile().skills, vec!["node", "react", "sql"]);
        assert!(created.profile().experience.is_empty());

        let updated = service
            .upsert("u1", &ProfileInput {
                twitter: Some("@dev".into()),
                ..input("Senior Developer", "rust")
            })
            .await
            .unwrap();
        assert!(matches!(updated, ProfileOutcome::Updated(_)));
        let profile = updated.into_profile();
        assert_eq!(profile.id, created.profile().id);
        assert_eq!(profile.status, "Senior Developer");
        assert_eq!(profile.company.as_deref(), Some("Acme"));
        assert_eq!(profile.social.youtube.as_deref(), Some("yt"));
        assert_eq!(profile.social.twitter.as_deref(), Some("@dev"));
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let ctx = TestContext::new();
        let service = ProfileService::new(&ctx.state);
        let payload = input("Developer", "a, b");

        service.upsert("u1", &payload).await.unwrap();
        let first = service.upsert("u1", &payload).await.unwrap().into_profile();
        let second = service.upsert("u1", &payload).await.unwrap().into_profile();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_first_submissions_leave_one_profile() {
        let ctx = TestContext::new();
        let mut handles = Vec::new();
        for n in 0..8 {
            let state = ctx.state.clone();
            handles.push(tokio::spawn(async move {
                ProfileService::new(&state)
                    .upsert("u1", &input(&format!("status {}", n), "x"))
                    .await
                    .unwrap()
            }));
        }
        let mut created = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ProfileOutcome::Created(_)) {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(ProfileService::new(&ctx.state).list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn experience_is_prepended_and_removed_by_its_own_id() {
        let ctx = TestContext::new();
        let service = ProfileService::new(&ctx.state);
        service.upsert("u1", &input("Developer", "x")).await.unwrap();

        let experience = |title: &str| ExperienceInput {
            title: Some(title.into()),
            company: Some("Acme".into()),
            from: Some("2020-01-01".into()),
            ..Default::default()
        };
        service.add_experience("u1", experience("first")).await.unwrap();
        let profile = service.add_experience("u1", experience("second")).await.unwrap();
        let titles: Vec<_> = profile.experience.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        let first_id = profile.experience[1].id.clone();
        let profile = service.remove_experience("u1", &first_id).await.unwrap();
        assert_eq!(profile.experience.len(), 1);
        assert_eq!(profile.experience[0].title, "second");

        let err = service.remove_experience("u1", &first_id).await.unwrap_err();
        assert_eq!(err.message(), "Experience not found");
    }

    #[tokio::test]
    async fn education_requires_fields_and_a_profile() {
        let ctx = TestContext::new();
        let service = ProfileService::new(&ctx.state);

        let err = service.add_education("u1", EducationInput::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let entry = EducationInput {
            school: Some("MIT".into()),
            degree: Some("BSc".into()),
            field_of_study: Some("CS".into()),
            from: Some("2010-09-01".into()),
            ..Default::default()
        };
        let err = service.add_education("u1", entry.clone()).await.unwrap_err();
        assert_eq!(err.message(), "Profile not found");

        service.upsert("u1", &input("Developer", "x")).await.unwrap();
        let profile = service.add_education("u1", entry).await.unwrap();
        assert_eq!(profile.education[0].field_of_study, "CS");
    }

    #[tokio::test]
    async fn delete_account_removes_user_profile_and_posts() {
        let ctx = TestContext::new();
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let service = ProfileService::new(&ctx.state);
        service.upsert(&user.id, &input("Developer", "x")).await.unwrap();
        ctx.create_post(&user, "hello").await;

        service.delete_account(&user.id).await.unwrap();

        assert!(service.me(&user.id).await.is_err());
        assert!(ctx.state.users().select_id(&user.id).await.unwrap().is_none());
        assert!(ctx.state.posts().select_any(&Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn views_carry_owner_summary() {
        let ctx = TestContext::new();
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let service = ProfileService::new(&ctx.state);
        service.upsert(&user.id, &input("Developer", "x")).await.unwrap();

        let view = service.by_user(&user.id).await.unwrap();
        assert_eq!(view.user.unwrap().name, "Ada");
        assert_eq!(service.by_user("nobody").await.unwrap_err().message(), "Profile not found");
    }
}
