#[cfg(test)]
pub mod test_db {
    use std::collections::HashMap;
    use std::sync::Once;

    use chrono::NaiveDate;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;
    use tracing::log::LevelFilter;

    use crate::auth::Role;
    use crate::catalog::section_name;
    use crate::database::ensure_schema;
    use crate::auth::User;
    use crate::db::{
        assign_parent, assign_therapist, create_child, create_user, get_user, insert_assessment,
        insert_tasks,
    };
    use crate::error::AppError;
    use crate::models::{NewAssessment, SkillTask};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    /// Single-connection in-memory pool with the current schema applied.
    /// One connection keeps every query on the same in-memory database.
    pub async fn memory_pool() -> Result<SqlitePool, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        ensure_schema(&pool).await?;
        Ok(pool)
    }

    pub fn task(code: &str, item_number: i64, max_score: i64) -> SkillTask {
        let section_code: String = code
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        SkillTask {
            code: code.to_string(),
            section_name: section_name(&section_code),
            section_code,
            item_number,
            objective: format!("Objective {}", code),
            criteria: format!("{} = full criteria", max_score),
            max_score,
            source_sheet: "test".to_string(),
        }
    }

    pub struct TestUser {
        pub email: String,
        pub full_name: String,
        pub role: Role,
    }

    pub struct TestAssessment {
        pub child: String,
        pub therapist_email: String,
        pub skill_code: String,
        pub score: i64,
        pub is_prompted: bool,
        pub date: NaiveDate,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        children: Vec<String>,
        therapist_links: Vec<(String, String)>,
        parent_links: Vec<(String, String)>,
        tasks: Vec<SkillTask>,
        assessments: Vec<TestAssessment>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, full_name: &str, role: Role) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                full_name: full_name.to_string(),
                role,
            });
            self
        }

        pub fn admin(self, email: &str, full_name: &str) -> Self {
            self.user(email, full_name, Role::Admin)
        }

        pub fn therapist(self, email: &str, full_name: &str) -> Self {
            self.user(email, full_name, Role::Therapist)
        }

        pub fn parent(self, email: &str, full_name: &str) -> Self {
            self.user(email, full_name, Role::Parent)
        }

        pub fn child(mut self, full_name: &str) -> Self {
            self.children.push(full_name.to_string());
            self
        }

        pub fn assign_therapist(mut self, child: &str, email: &str) -> Self {
            self.therapist_links
                .push((child.to_string(), email.to_string()));
            self
        }

        pub fn assign_parent(mut self, child: &str, email: &str) -> Self {
            self.parent_links.push((child.to_string(), email.to_string()));
            self
        }

        pub fn task(mut self, code: &str, item_number: i64, max_score: i64) -> Self {
            self.tasks.push(task(code, item_number, max_score));
            self
        }

        pub fn assessment(
            mut self,
            child: &str,
            therapist_email: &str,
            skill_code: &str,
            score: i64,
            is_prompted: bool,
            date: &str,
        ) -> Self {
            self.assessments.push(TestAssessment {
                child: child.to_string(),
                therapist_email: therapist_email.to_string(),
                skill_code: skill_code.to_string(),
                score,
                is_prompted,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("Invalid test date"),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            let pool = memory_pool().await?;

            let mut user_ids: HashMap<String, i64> = HashMap::new();
            let mut child_ids: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let id = create_user(
                    &pool,
                    &user.email,
                    &user.full_name,
                    user.role,
                    STANDARD_PASSWORD,
                )
                .await?;
                user_ids.insert(user.email.clone(), id);
            }

            let creator = self
                .users
                .iter()
                .find(|u| u.role == Role::Admin)
                .and_then(|u| user_ids.get(&u.email).copied());
            for name in &self.children {
                let id = create_child(&pool, name, None, None, creator).await?;
                child_ids.insert(name.clone(), id);
            }

            for (child, email) in &self.therapist_links {
                assign_therapist(&pool, child_ids[child], user_ids[email]).await?;
            }
            for (child, email) in &self.parent_links {
                assign_parent(&pool, child_ids[child], user_ids[email]).await?;
            }

            if !self.tasks.is_empty() {
                insert_tasks(&pool, &self.tasks).await?;
            }

            for a in &self.assessments {
                insert_assessment(
                    &pool,
                    &NewAssessment {
                        child_id: child_ids[&a.child],
                        therapist_id: user_ids[&a.therapist_email],
                        skill_code: a.skill_code.clone(),
                        score: a.score,
                        is_prompted: a.is_prompted,
                        assessment_date: a.date,
                        comment: None,
                    },
                )
                .await?;
            }

            Ok(TestDb {
                pool,
                user_ids,
                child_ids,
            })
        }
    }

    /// Looks an account up by its stored (lowercased) email.
    pub async fn user_by_email(pool: &SqlitePool, email: &str) -> Option<User> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
            .expect("Failed to look up user id")?;
        Some(get_user(pool, id).await.expect("Failed to load user"))
    }

    pub struct TestDb {
        pub pool: SqlitePool,
        pub user_ids: HashMap<String, i64>,
        pub child_ids: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> i64 {
            self.user_ids[email]
        }

        pub fn child_id(&self, name: &str) -> i64 {
            self.child_ids[name]
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    use crate::env::Settings;
    use crate::init_rocket;

    pub use super::test_db::*;

    /// Admin, therapist and parent accounts, two children (only "Ada" is
    /// assigned) and a small slice of the catalog.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin@example.com", "Alice Admin")
            .therapist("therapist@example.com", "Theo Therapist")
            .therapist("other@example.com", "Olga Other")
            .parent("parent@example.com", "Paula Parent")
            .child("Ada")
            .child("Ben")
            .assign_therapist("Ada", "therapist@example.com")
            .assign_parent("Ada", "parent@example.com")
            .task("A1", 1, 2)
            .task("A2", 2, 2)
            .task("B1", 1, 4)
            .task("B12", 12, 4)
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), Settings::default())
            .expect("Failed to build rocket");
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to create test client");
        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, email: &str) {
        let response = client
            .post("/auth/login")
            .header(ContentType::Form)
            .body(format!("email={}&password={}", email, STANDARD_PASSWORD))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::SeeOther, "login failed for {}", email);
    }
}
