use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, NewReview, Pagination, Principal, Review, ReviewPatch, ReviewStats,
};

const MAX_COMMENT_LEN: usize = 1000;

fn validate_rating(rating: i32) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::invalid("rating must be between 1 and 5"));
    }
    Ok(())
}

fn validate_comment(comment: &str) -> Result<(), AppError> {
    let len = comment.chars().count();
    if len == 0 || len > MAX_COMMENT_LEN {
        return Err(AppError::invalid(format!(
            "comment must be between 1 and {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(())
}

/// Only the owner of a completed booking may review it, and only once.
pub fn create_review(
    conn: &mut Connection,
    principal: &Principal,
    req: &NewReview,
) -> Result<Review, AppError> {
    validate_rating(req.rating)?;
    validate_comment(&req.comment)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking(&tx, req.booking_id)?
        .ok_or_else(|| AppError::not_found("booking not found"))?;
    if !booking.is_owned_by(principal.id) {
        return Err(AppError::forbidden("you can only review your own bookings"));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::invalid("you can only review completed bookings"));
    }
    if queries::get_review_for_booking(&tx, booking.id)?.is_some() {
        return Err(AppError::conflict("review already exists for this booking"));
    }

    let review = Review {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        rating: req.rating,
        comment: req.comment.clone(),
        created_at: Utc::now(),
    };
    // the UNIQUE(booking_id) constraint backs the check above
    queries::insert_review(&tx, &review)?;
    let review = load(&tx, review.id)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, booking_id = %review.booking_id, "review created");
    Ok(review)
}

pub fn get_review(conn: &Connection, id: Uuid) -> Result<Review, AppError> {
    load(conn, id)
}

pub fn update_review(
    conn: &mut Connection,
    principal: &Principal,
    id: Uuid,
    patch: &ReviewPatch,
) -> Result<Review, AppError> {
    if let Some(rating) = patch.rating {
        validate_rating(rating)?;
    }
    if let Some(comment) = &patch.comment {
        validate_comment(comment)?;
    }

    let tx = conn.transaction()?;
    let mut review = load(&tx, id)?;
    authorize_owner(&tx, principal, &review, "not authorized to update this review")?;

    if let Some(rating) = patch.rating {
        review.rating = rating;
    }
    if let Some(comment) = &patch.comment {
        review.comment = comment.clone();
    }
    queries::update_review(&tx, &review)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, "review updated");
    Ok(review)
}

pub fn delete_review(
    conn: &mut Connection,
    principal: &Principal,
    id: Uuid,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let review = load(&tx, id)?;
    authorize_owner(&tx, principal, &review, "not authorized to delete this review")?;
    queries::delete_review(&tx, review.id)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, "review deleted");
    Ok(())
}

pub fn list_service_reviews(
    conn: &Connection,
    service_id: Uuid,
    page: &Pagination,
) -> Result<Vec<Review>, AppError> {
    Ok(queries::get_service_reviews(conn, service_id, page)?)
}

/// Count and mean rating (two decimals) over every review of a service.
pub fn service_stats(conn: &Connection, service_id: Uuid) -> Result<ReviewStats, AppError> {
    let ratings = queries::get_service_ratings(conn, service_id)?;
    Ok(aggregate(&ratings))
}

fn aggregate(ratings: &[i32]) -> ReviewStats {
    if ratings.is_empty() {
        return ReviewStats {
            total_reviews: 0,
            average_rating: 0.0,
        };
    }
    let total: i64 = ratings.iter().map(|r| *r as i64).sum();
    let mean = total as f64 / ratings.len() as f64;
    ReviewStats {
        total_reviews: ratings.len() as i64,
        average_rating: (mean * 100.0).round() / 100.0,
    }
}

fn load(conn: &Connection, id: Uuid) -> Result<Review, AppError> {
    queries::get_review(conn, id)?.ok_or_else(|| AppError::not_found("review not found"))
}

fn authorize_owner(
    conn: &Connection,
    principal: &Principal,
    review: &Review,
    denied: &str,
) -> Result<(), AppError> {
    if principal.is_admin() {
        return Ok(());
    }
    let booking: Option<Booking> = queries::get_booking(conn, review.booking_id)?;
    match booking {
        Some(b) if b.is_owned_by(principal.id) => Ok(()),
        _ => Err(AppError::forbidden(denied)),
    }
}
