//! # Membership
//!
//! Students (borrowers) and admins (librarians).
//!
//! Identity here is lookup by exact identifier. Sessions, sign-in screens and
//! credential hashing belong to the presentation layer; `authenticate` only
//! compares the opaque credential it is given with the stored one.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use libris_core::validation::{
    validate_credential, validate_limit, validate_student_id, validate_student_name,
    validate_username,
};
use libris_core::{Admin, Entity, NewAdmin, NewStudent, Student, StudentProfile};

// =============================================================================
// Students
// =============================================================================

/// Repository for students.
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    /// Creates a new StudentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StudentRepository { pool }
    }

    /// Registers a student under an externally assigned ID.
    ///
    /// ## Errors
    /// - `Validation` for a malformed ID or empty name
    /// - `UniqueViolation` if the ID is already registered
    pub async fn add(&self, student: &NewStudent) -> DbResult<Student> {
        validate_student_id(&student.student_id)?;
        validate_student_name(&student.name)?;

        let created: Student = sqlx::query_as(
            r#"
            INSERT INTO students (student_id, name, contact)
            VALUES (?1, ?2, ?3)
            RETURNING student_id, name, contact, created_at, updated_at
            "#,
        )
        .bind(student.student_id.trim())
        .bind(student.name.trim())
        .bind(student.contact.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .fetch_one(&self.pool)
        .await?;

        info!(student_id = %created.student_id, "Student registered");
        Ok(created)
    }

    /// Gets a student by ID.
    ///
    /// ## Errors
    /// - `NotFound(Student)` if the ID does not resolve
    pub async fn get(&self, student_id: &str) -> DbResult<Student> {
        let mut conn = self.pool.acquire().await?;
        fetch_student(&mut conn, student_id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::Student, student_id))
    }

    /// Whether a student ID resolves. Used for student sign-in.
    pub async fn exists(&self, student_id: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_student(&mut conn, student_id).await?.is_some())
    }

    /// Lists students ordered by ID.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Student>> {
        validate_limit(limit)?;

        let students: Vec<Student> = sqlx::query_as(
            r#"
            SELECT student_id, name, contact, created_at, updated_at
            FROM students
            ORDER BY student_id
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = students.len(), "Listed students");
        Ok(students)
    }

    /// Replaces a student's name and contact. The ID never changes.
    pub async fn update_profile(
        &self,
        student_id: &str,
        profile: &StudentProfile,
    ) -> DbResult<Student> {
        validate_student_name(&profile.name)?;

        let updated: Option<Student> = sqlx::query_as(
            r#"
            UPDATE students
            SET name = ?2, contact = ?3, updated_at = ?4
            WHERE student_id = ?1
            RETURNING student_id, name, contact, created_at, updated_at
            "#,
        )
        .bind(student_id)
        .bind(profile.name.trim())
        .bind(profile.contact.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        let updated = updated.ok_or_else(|| DbError::not_found(Entity::Student, student_id))?;
        info!(student_id = %updated.student_id, "Student profile updated");
        Ok(updated)
    }
}

pub(crate) async fn fetch_student(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> DbResult<Option<Student>> {
    let student = sqlx::query_as(
        r#"
        SELECT student_id, name, contact, created_at, updated_at
        FROM students
        WHERE student_id = ?1
        "#,
    )
    .bind(student_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(student)
}

// =============================================================================
// Admins
// =============================================================================

/// Repository for librarian accounts.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    pool: SqlitePool,
}

impl AdminRepository {
    /// Creates a new AdminRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AdminRepository { pool }
    }

    /// Registers an admin.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the username is taken
    pub async fn add(&self, admin: &NewAdmin) -> DbResult<Admin> {
        validate_username(&admin.username)?;
        validate_credential(&admin.credential)?;

        let created: Admin = sqlx::query_as(
            r#"
            INSERT INTO admins (username, credential)
            VALUES (?1, ?2)
            RETURNING admin_id, username, credential, created_at
            "#,
        )
        .bind(admin.username.trim())
        .bind(&admin.credential)
        .fetch_one(&self.pool)
        .await?;

        info!(admin_id = created.admin_id, username = %created.username, "Admin registered");
        Ok(created)
    }

    /// Looks up an admin by username.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<Admin>> {
        let admin = sqlx::query_as(
            r#"
            SELECT admin_id, username, credential, created_at
            FROM admins
            WHERE username = ?1
            "#,
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    /// Returns the admin if `credential` matches the stored one exactly.
    ///
    /// Unknown usernames and wrong credentials both yield `None`.
    pub async fn authenticate(&self, username: &str, credential: &str) -> DbResult<Option<Admin>> {
        let admin = self
            .find_by_username(username)
            .await?
            .filter(|admin| admin.credential_matches(credential));

        if admin.is_none() {
            warn!(username = %username.trim(), "Admin authentication failed");
        }
        Ok(admin)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
