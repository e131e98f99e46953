//! Admission and lifecycle tests for the booking service

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use uuid::Uuid;

    use agrirent_server::booking::{
        BookingError, BookingService, BookingStatus, CreateBookingRequest, TransitionTarget,
    };
    use agrirent_server::models::UserRole;
    use agrirent_server::retry::RetryPolicy;
    use agrirent_server::review::{CreateReviewRequest, ReviewError, ReviewService};

    /// Helper to create a test database pool with the schema applied
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/agrirent_test".to_string());

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        agrirent_server::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn booking_service(pool: &PgPool) -> BookingService {
        BookingService::new(pool.clone(), RetryPolicy::default())
    }

    fn review_service(pool: &PgPool) -> ReviewService {
        ReviewService::new(pool.clone(), RetryPolicy::default())
    }

    async fn create_user(pool: &PgPool, role: UserRole) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, '$2b$12$notarealhash', $4, now(), now())
            "#,
        )
        .bind(id)
        .bind(format!("user-{}", id))
        .bind(format!("{}@example.com", id))
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to insert test user");
        id
    }

    async fn create_listing(
        pool: &PgPool,
        owner_id: Uuid,
        available: bool,
        hourly_rate: Option<f64>,
        daily_rate: f64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO machinery (
                id, owner_id, name, machinery_type, hourly_rate, daily_rate,
                location, photos, available, created_at, updated_at
            )
            VALUES ($1, $2, 'Test Tractor', 'TRACTOR', $3, $4, 'Testville',
                    ARRAY['tractor.jpg'], $5, now(), now())
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(hourly_rate)
        .bind(daily_rate)
        .bind(available)
        .execute(pool)
        .await
        .expect("Failed to insert test listing");
        id
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn request(machinery_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateBookingRequest {
        CreateBookingRequest {
            machinery_id,
            start_time: start,
            end_time: end,
            notes: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_rejects_unknown_machinery() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let renter = create_user(&pool, UserRole::Renter).await;

        let result = service
            .create_booking(
                renter,
                request(Uuid::new_v4(), at(2030, 1, 1, 0), at(2030, 1, 3, 0)),
            )
            .await;

        assert!(matches!(result, Err(BookingError::MachineryNotFound)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_rejects_unavailable_listing_without_mutation() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, false, None, 500.0).await;

        let result = service
            .create_booking(renter, request(listing, at(2030, 1, 1, 0), at(2030, 1, 3, 0)))
            .await;

        assert!(matches!(result, Err(BookingError::Unavailable)));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE machinery_id = $1")
            .bind(listing)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "rejected admission must not persist anything");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_rejects_inclusive_boundary_overlap() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let other_renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let first = service
            .create_booking(renter, request(listing, at(2030, 1, 1, 0), at(2030, 1, 3, 0)))
            .await
            .expect("first booking should be admitted");
        assert_eq!(first.status, BookingStatus::Pending);

        // Back-to-back window sharing the boundary instant counts as overlap
        let touching = service
            .create_booking(
                other_renter,
                request(listing, at(2030, 1, 3, 0), at(2030, 1, 5, 0)),
            )
            .await;
        assert!(matches!(touching, Err(BookingError::Conflict)));

        // Fully contained window conflicts too
        let contained = service
            .create_booking(
                other_renter,
                request(listing, at(2030, 1, 1, 12), at(2030, 1, 2, 12)),
            )
            .await;
        assert!(matches!(contained, Err(BookingError::Conflict)));

        // A disjoint earlier window is admitted
        let disjoint = service
            .create_booking(
                other_renter,
                request(listing, at(2029, 12, 28, 0), at(2029, 12, 30, 0)),
            )
            .await;
        assert!(disjoint.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_does_not_count_terminal_bookings() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let first = service
            .create_booking(renter, request(listing, at(2030, 2, 1, 0), at(2030, 2, 3, 0)))
            .await
            .unwrap();

        // Owner rejects; the window is free again
        service
            .transition_booking(first.id, owner, TransitionTarget::Rejected)
            .await
            .unwrap();

        let second = service
            .create_booking(renter, request(listing, at(2030, 2, 1, 0), at(2030, 2, 3, 0)))
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_computes_price_from_listing_rates() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, Some(20.0), 500.0).await;

        // 48 hours with a daily rate: two full days
        let booking = service
            .create_booking(renter, request(listing, at(2030, 3, 1, 0), at(2030, 3, 3, 0)))
            .await
            .unwrap();
        assert_eq!(booking.total_price, 1000.0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn admission_rejects_inverted_window() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let result = service
            .create_booking(renter, request(listing, at(2030, 1, 3, 0), at(2030, 1, 1, 0)))
            .await;
        assert!(matches!(result, Err(BookingError::InvalidTimeRange)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn transition_by_non_owner_is_forbidden_regardless_of_status() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let stranger = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let booking = service
            .create_booking(renter, request(listing, at(2030, 4, 1, 0), at(2030, 4, 3, 0)))
            .await
            .unwrap();

        // The renter cannot approve their own booking
        let by_renter = service
            .transition_booking(booking.id, renter, TransitionTarget::Confirmed)
            .await;
        assert!(matches!(by_renter, Err(BookingError::Forbidden(_))));

        // Neither can an unrelated user, even after the owner confirmed
        service
            .transition_booking(booking.id, owner, TransitionTarget::Confirmed)
            .await
            .unwrap();
        let by_stranger = service
            .transition_booking(booking.id, stranger, TransitionTarget::Confirmed)
            .await;
        assert!(matches!(by_stranger, Err(BookingError::Forbidden(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn transition_twice_fails_invalid_state() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let booking = service
            .create_booking(renter, request(listing, at(2030, 5, 1, 0), at(2030, 5, 3, 0)))
            .await
            .unwrap();

        let confirmed = service
            .transition_booking(booking.id, owner, TransitionTarget::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let again = service
            .transition_booking(booking.id, owner, TransitionTarget::Confirmed)
            .await;
        assert!(matches!(
            again,
            Err(BookingError::InvalidState {
                current: BookingStatus::Confirmed,
                ..
            })
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn renter_can_cancel_confirmed_booking_but_owner_cannot() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let booking = service
            .create_booking(renter, request(listing, at(2030, 6, 1, 0), at(2030, 6, 3, 0)))
            .await
            .unwrap();
        service
            .transition_booking(booking.id, owner, TransitionTarget::Confirmed)
            .await
            .unwrap();

        // Once confirmed, the owner can no longer withdraw unilaterally
        let owner_cancel = service
            .transition_booking(booking.id, owner, TransitionTarget::Cancelled)
            .await;
        assert!(matches!(owner_cancel, Err(BookingError::InvalidState { .. })));

        let renter_cancel = service
            .transition_booking(booking.id, renter, TransitionTarget::Cancelled)
            .await
            .unwrap();
        assert_eq!(renter_cancel.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn completed_booking_accepts_exactly_one_review() {
        let pool = setup_test_db().await;
        let bookings = booking_service(&pool);
        let reviews = review_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let booking = bookings
            .create_booking(renter, request(listing, at(2030, 7, 1, 0), at(2030, 7, 3, 0)))
            .await
            .unwrap();

        // Reviews are rejected until the rental completed
        let too_early = reviews
            .create_review(
                renter,
                CreateReviewRequest {
                    booking_id: booking.id,
                    rating: 5,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(too_early, Err(ReviewError::BookingNotCompleted)));

        bookings
            .transition_booking(booking.id, owner, TransitionTarget::Confirmed)
            .await
            .unwrap();
        bookings.complete_booking(booking.id).await.unwrap();

        let review = reviews
            .create_review(
                renter,
                CreateReviewRequest {
                    booking_id: booking.id,
                    rating: 4,
                    comment: Some("Solid machine".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(review.reviewee_id, owner);

        // Second review of the same booking is refused
        let duplicate = reviews
            .create_review(
                renter,
                CreateReviewRequest {
                    booking_id: booking.id,
                    rating: 1,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(duplicate, Err(ReviewError::AlreadyReviewed)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn complete_booking_requires_confirmed_state() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = create_user(&pool, UserRole::Owner).await;
        let renter = create_user(&pool, UserRole::Renter).await;
        let listing = create_listing(&pool, owner, true, None, 500.0).await;

        let booking = service
            .create_booking(renter, request(listing, at(2030, 8, 1, 0), at(2030, 8, 3, 0)))
            .await
            .unwrap();

        let result = service.complete_booking(booking.id).await;
        assert!(matches!(
            result,
            Err(BookingError::InvalidState {
                current: BookingStatus::Pending,
                requested: BookingStatus::Completed,
            })
        ));
    }

    // ===== Pure tests (no database) =====

    #[test]
    fn booking_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
    }

    #[test]
    fn transition_target_maps_to_status() {
        assert_eq!(
            TransitionTarget::Confirmed.as_status(),
            BookingStatus::Confirmed
        );
        assert_eq!(
            TransitionTarget::Rejected.as_status(),
            BookingStatus::Rejected
        );
        assert_eq!(
            TransitionTarget::Cancelled.as_status(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn review_rating_is_validated() {
        use validator::Validate;

        let valid = CreateReviewRequest {
            booking_id: Uuid::new_v4(),
            rating: 5,
            comment: None,
        };
        assert!(valid.validate().is_ok());

        let too_low = CreateReviewRequest {
            booking_id: Uuid::new_v4(),
            rating: 0,
            comment: None,
        };
        assert!(too_low.validate().is_err());

        let too_high = CreateReviewRequest {
            booking_id: Uuid::new_v4(),
            rating: 6,
            comment: None,
        };
        assert!(too_high.validate().is_err());
    }
}
