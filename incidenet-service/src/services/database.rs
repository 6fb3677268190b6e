//! Database service for incidenet-service.
//!
//! All persistence goes through this wrapper. Multi-entity writes that must
//! not be partially observable (module deletion cascade, permission-set
//! replacement, incidence composite creation) run inside transactions.

use crate::models::{
    normalize_permission_names, permission_set_diff, AccessGrant, CreateIncidenceBundle,
    CreateModule, CreatePayment, CreatePlan, CreateRole, CreateSubscription, FamilyLink,
    FamilyMemberInput, Incidence, IncidenceBundleResult, IncidenceDetail, IncidenceInput,
    Institution, InstitutionInput, ListIncidencesFilter, Module, Payment, PaymentStatus, Permission,
    Person, PersonInput, Plan, Role, Subscription, UpdateIncidence, UpdateModule, UpdatePlan,
    UpdateRole, UpdateUser, User,
};
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        Ok(())
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn insert_role(&self, input: &CreateRole) -> Result<Role, AppError> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (role_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING role_id, name, description, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("Role name already exists"))
    }

    pub async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE lower(name) = lower($1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn update_role(
        &self,
        role_id: Uuid,
        input: &UpdateRole,
    ) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE role_id = $1
            RETURNING role_id, name, description, created_utc
            "#,
        )
        .bind(role_id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(conflict_on_unique("Role name already exists"))
    }

    /// Delete a role. Deliberately unguarded beyond the database's
    /// referential constraints; a role still referenced by users or grants
    /// surfaces as a database error.
    pub async fn delete_role(&self, role_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Modules & permissions
    // =========================================================================

    pub async fn insert_module(&self, input: &CreateModule) -> Result<Module, AppError> {
        sqlx::query_as::<_, Module>(
            r#"
            INSERT INTO modules (module_id, name, route_path, icon, menu_order, visible)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING module_id, name, route_path, icon, menu_order, visible, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.route_path)
        .bind(&input.icon)
        .bind(input.menu_order)
        .bind(input.visible)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn find_module_by_id(&self, module_id: Uuid) -> Result<Option<Module>, AppError> {
        sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE module_id = $1")
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        sqlx::query_as::<_, Module>("SELECT * FROM modules ORDER BY menu_order, name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn update_module(
        &self,
        module_id: Uuid,
        input: &UpdateModule,
    ) -> Result<Option<Module>, AppError> {
        sqlx::query_as::<_, Module>(
            r#"
            UPDATE modules
            SET name = COALESCE($2, name),
                route_path = COALESCE($3, route_path),
                icon = COALESCE($4, icon),
                menu_order = COALESCE($5, menu_order),
                visible = COALESCE($6, visible)
            WHERE module_id = $1
            RETURNING module_id, name, route_path, icon, menu_order, visible, created_utc
            "#,
        )
        .bind(module_id)
        .bind(&input.name)
        .bind(&input.route_path)
        .bind(&input.icon)
        .bind(input.menu_order)
        .bind(input.visible)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Delete a module together with its permissions and their grants, as
    /// one atomic unit: grants first, then permissions, then the module.
    pub async fn delete_module_cascade(&self, module_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            DELETE FROM access_grants
            WHERE permission_id IN (SELECT permission_id FROM permissions WHERE module_id = $1)
            "#,
        )
        .bind(module_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("DELETE FROM permissions WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM modules WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_module_permissions(
        &self,
        module_id: Uuid,
    ) -> Result<Vec<Permission>, AppError> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE module_id = $1 ORDER BY name",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Reconcile a module's permission set to exactly `desired` (raw names;
    /// normalized here). Removed permissions lose their grants first; grants
    /// of retained permissions are untouched. Atomic: any failure aborts the
    /// whole reconciliation.
    pub async fn replace_module_permissions(
        &self,
        module_id: Uuid,
        desired: &[String],
    ) -> Result<Vec<Permission>, AppError> {
        let desired = normalize_permission_names(desired);

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing: Vec<String> = sqlx::query_scalar::<_, String>(
            "SELECT lower(name) FROM permissions WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let (to_delete, to_create) = permission_set_diff(&existing, &desired);

        if !to_delete.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM access_grants
                WHERE permission_id IN (
                    SELECT permission_id FROM permissions
                    WHERE module_id = $1 AND lower(name) = ANY($2)
                )
                "#,
            )
            .bind(module_id)
            .bind(&to_delete)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            sqlx::query("DELETE FROM permissions WHERE module_id = $1 AND lower(name) = ANY($2)")
                .bind(module_id)
                .bind(&to_delete)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        for name in &to_create {
            sqlx::query("INSERT INTO permissions (permission_id, module_id, name) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(module_id)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE module_id = $1 ORDER BY name",
        )
        .bind(module_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(permissions)
    }

    /// Add permission names not already present on the module; never deletes.
    pub async fn merge_module_permissions(
        &self,
        module_id: Uuid,
        names: &[String],
    ) -> Result<Vec<Permission>, AppError> {
        let names = normalize_permission_names(names);

        for name in &names {
            sqlx::query(
                r#"
                INSERT INTO permissions (permission_id, module_id, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (module_id, name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(module_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }

        self.list_module_permissions(module_id).await
    }

    // =========================================================================
    // Access grants
    // =========================================================================

    /// Upsert a grant keyed on (role, permission).
    pub async fn upsert_access_grant(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted: bool,
    ) -> Result<AccessGrant, AppError> {
        sqlx::query_as::<_, AccessGrant>(
            r#"
            INSERT INTO access_grants (role_id, permission_id, granted)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, permission_id) DO UPDATE SET granted = EXCLUDED.granted
            RETURNING role_id, permission_id, granted
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(granted)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn list_role_grants(&self, role_id: Uuid) -> Result<Vec<AccessGrant>, AppError> {
        sqlx::query_as::<_, AccessGrant>("SELECT * FROM access_grants WHERE role_id = $1")
            .bind(role_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Whether the role holds a truthy grant for any permission with one of
    /// the given names. The lookup is by name only, across all modules.
    pub async fn role_has_any_granted(
        &self,
        role_id: Uuid,
        names: &[String],
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM access_grants g
                JOIN permissions p ON p.permission_id = g.permission_id
                WHERE g.role_id = $1 AND g.granted AND lower(p.name) = ANY($2)
            )
            "#,
        )
        .bind(role_id)
        .bind(names)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, password_hash, full_name, role_id, active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role_id)
        .bind(user.active)
        .bind(user.created_utc)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Email already registered"))?;
        Ok(())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_utc DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        input: &UpdateUser,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                role_id = COALESCE($3, role_id)
            WHERE user_id = $1
            RETURNING user_id, email, password_hash, full_name, role_id, active, created_utc
            "#,
        )
        .bind(user_id)
        .bind(&input.full_name)
        .bind(input.role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn set_user_active(
        &self,
        user_id: Uuid,
        active: bool,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET active = $2 WHERE user_id = $1
            RETURNING user_id, email, password_hash, full_name, role_id, active, created_utc
            "#,
        )
        .bind(user_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    // =========================================================================
    // Persons & incidences
    // =========================================================================

    /// Materialize an incidence bundle: resolve the person (and institution,
    /// when a code is supplied) by natural key, insert the incidence, then
    /// resolve and link each family member. Runs in one transaction so a
    /// failure partway through leaves nothing behind.
    pub async fn create_incidence_bundle(
        &self,
        bundle: &CreateIncidenceBundle,
        reported_by: Option<Uuid>,
    ) -> Result<IncidenceBundleResult, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let person = upsert_person(&mut tx, &bundle.person).await?;

        let institution = match &bundle.institution {
            Some(input) => Some(upsert_institution(&mut tx, input).await?),
            None => None,
        };

        let incidence = insert_incidence(
            &mut tx,
            person.person_id,
            institution.as_ref().map(|i| i.institution_id),
            reported_by,
            &bundle.incidence,
        )
        .await?;

        let mut family_links = Vec::with_capacity(bundle.family_members.len());
        for member in &bundle.family_members {
            let link = upsert_family_member(&mut tx, person.person_id, member).await?;
            family_links.push(link);
        }

        tx.commit().await.map_err(db_err)?;

        Ok(IncidenceBundleResult {
            incidence,
            person,
            institution,
            family_links,
        })
    }

    pub async fn list_incidences(
        &self,
        filter: &ListIncidencesFilter,
    ) -> Result<Vec<Incidence>, AppError> {
        sqlx::query_as::<_, Incidence>(
            r#"
            SELECT i.*
            FROM incidences i
            JOIN persons per ON per.person_id = i.person_id
            WHERE ($1::TEXT IS NULL OR per.national_id = $1)
              AND ($2::TEXT IS NULL OR i.status = $2)
              AND ($3::TEXT IS NULL OR i.category = $3)
            ORDER BY i.created_utc DESC
            "#,
        )
        .bind(&filter.national_id)
        .bind(&filter.status)
        .bind(&filter.category)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn find_incidence_detail(
        &self,
        incidence_id: Uuid,
    ) -> Result<Option<IncidenceDetail>, AppError> {
        sqlx::query_as::<_, IncidenceDetail>(
            r#"
            SELECT i.incidence_id, i.person_id,
                   per.national_id AS person_national_id,
                   per.full_name AS person_full_name,
                   i.institution_id, inst.name AS institution_name,
                   i.title, i.description, i.category, i.confidentiality,
                   i.amount, i.status, i.occurred_on, i.created_utc
            FROM incidences i
            JOIN persons per ON per.person_id = i.person_id
            LEFT JOIN institutions inst ON inst.institution_id = i.institution_id
            WHERE i.incidence_id = $1
            "#,
        )
        .bind(incidence_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn update_incidence(
        &self,
        incidence_id: Uuid,
        input: &UpdateIncidence,
    ) -> Result<Option<Incidence>, AppError> {
        sqlx::query_as::<_, Incidence>(
            r#"
            UPDATE incidences
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                confidentiality = COALESCE($5, confidentiality),
                amount = COALESCE($6, amount),
                status = COALESCE($7, status),
                occurred_on = COALESCE($8, occurred_on)
            WHERE incidence_id = $1
            RETURNING *
            "#,
        )
        .bind(incidence_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.confidentiality)
        .bind(input.amount)
        .bind(&input.status)
        .bind(input.occurred_on)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn delete_incidence(&self, incidence_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM incidences WHERE incidence_id = $1")
            .bind(incidence_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Plans, subscriptions, payments
    // =========================================================================

    pub async fn insert_plan(&self, input: &CreatePlan) -> Result<Plan, AppError> {
        sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (plan_id, name, description, price, currency, billing_interval, max_users)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING plan_id, name, description, price, currency, billing_interval, max_users, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.currency)
        .bind(&input.billing_interval)
        .bind(input.max_users)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn find_plan_by_id(&self, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE plan_id = $1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> Result<Vec<Plan>, AppError> {
        sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE active OR $1 ORDER BY price",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn update_plan(
        &self,
        plan_id: Uuid,
        input: &UpdatePlan,
    ) -> Result<Option<Plan>, AppError> {
        sqlx::query_as::<_, Plan>(
            r#"
            UPDATE plans
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                active = COALESCE($5, active)
            WHERE plan_id = $1
            RETURNING plan_id, name, description, price, currency, billing_interval, max_users, active, created_utc
            "#,
        )
        .bind(plan_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn insert_subscription(
        &self,
        input: &CreateSubscription,
    ) -> Result<Subscription, AppError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (subscription_id, user_id, plan_id, status, starts_on)
            VALUES ($1, $2, $3, 'active', $4)
            RETURNING subscription_id, user_id, plan_id, status, starts_on, ends_on, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(input.starts_on)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn find_subscription_by_id(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn list_user_subscriptions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY created_utc DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn cancel_subscription(
        &self,
        subscription_id: Uuid,
        ends_on: NaiveDate,
    ) -> Result<Option<Subscription>, AppError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = 'cancelled', ends_on = $2
            WHERE subscription_id = $1
            RETURNING subscription_id, user_id, plan_id, status, starts_on, ends_on, created_utc
            "#,
        )
        .bind(subscription_id)
        .bind(ends_on)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn insert_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, subscription_id, amount, currency, reference, method, status, paid_on)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING payment_id, subscription_id, amount, currency, reference, method, status, paid_on, verified_by, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.subscription_id)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(&input.reference)
        .bind(&input.method)
        .bind(input.paid_on)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn list_subscription_payments(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE subscription_id = $1 ORDER BY created_utc DESC",
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Record the manual verification outcome of a payment claim.
    pub async fn set_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        verified_by: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, verified_by = $3
            WHERE payment_id = $1
            RETURNING payment_id, subscription_id, amount, currency, reference, method, status, paid_on, verified_by, created_utc
            "#,
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(verified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }
}

// =============================================================================
// Transaction-scoped helpers for the incidence composite
// =============================================================================

async fn upsert_person(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    input: &PersonInput,
) -> Result<Person, AppError> {
    upsert_person_on(&mut **tx, input).await
}

async fn upsert_person_on(conn: &mut PgConnection, input: &PersonInput) -> Result<Person, AppError> {
    sqlx::query_as::<_, Person>(
        r#"
        INSERT INTO persons (person_id, national_id, full_name, birth_date)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (national_id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            birth_date = COALESCE(EXCLUDED.birth_date, persons.birth_date),
            updated_utc = now()
        RETURNING person_id, national_id, full_name, birth_date, created_utc, updated_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.national_id)
    .bind(&input.full_name)
    .bind(input.birth_date)
    .fetch_one(conn)
    .await
    .map_err(db_err)
}

async fn upsert_institution(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    input: &InstitutionInput,
) -> Result<Institution, AppError> {
    sqlx::query_as::<_, Institution>(
        r#"
        INSERT INTO institutions (institution_id, code, name, kind)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (code) DO UPDATE
        SET name = EXCLUDED.name,
            kind = COALESCE(EXCLUDED.kind, institutions.kind),
            updated_utc = now()
        RETURNING institution_id, code, name, kind, created_utc, updated_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.code)
    .bind(&input.name)
    .bind(&input.kind)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_err)
}

async fn insert_incidence(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    person_id: Uuid,
    institution_id: Option<Uuid>,
    reported_by: Option<Uuid>,
    input: &IncidenceInput,
) -> Result<Incidence, AppError> {
    sqlx::query_as::<_, Incidence>(
        r#"
        INSERT INTO incidences (incidence_id, person_id, institution_id, reported_by, title,
                                description, category, confidentiality, amount, status, occurred_on)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING incidence_id, person_id, institution_id, reported_by, title, description,
                  category, confidentiality, amount, status, occurred_on, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(person_id)
    .bind(institution_id)
    .bind(reported_by)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.confidentiality)
    .bind(input.amount)
    .bind(&input.status)
    .bind(input.occurred_on)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_err)
}

async fn upsert_family_member(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    person_id: Uuid,
    member: &FamilyMemberInput,
) -> Result<FamilyLink, AppError> {
    let relative = upsert_person_on(
        &mut **tx,
        &PersonInput {
            national_id: member.national_id.clone(),
            full_name: member.full_name.clone(),
            birth_date: member.birth_date,
        },
    )
    .await?;

    sqlx::query_as::<_, FamilyLink>(
        r#"
        INSERT INTO family_links (family_member_id, person_id, relationship)
        VALUES ($1, $2, $3)
        ON CONFLICT (family_member_id, person_id) DO UPDATE
        SET relationship = EXCLUDED.relationship
        RETURNING family_member_id, person_id, relationship
        "#,
    )
    .bind(relative.person_id)
    .bind(person_id)
    .bind(&member.relationship)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_err)
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

/// Map unique-constraint violations to a 409, everything else to a database
/// error.
fn conflict_on_unique(message: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e: sqlx::Error| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!(message))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!(e)),
    }
}
