use failure::Error as FailureError;

use crate::models::{CompanyActivitiesFilter, NewCompanyActivities};
use crate::repos;
use crate::types::DbPool;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id                 UUID PRIMARY KEY,
    email              VARCHAR NOT NULL UNIQUE,
    password_hash      VARCHAR NOT NULL,
    first_name         VARCHAR NOT NULL,
    last_name          VARCHAR NOT NULL,
    phone              VARCHAR,
    company_name       VARCHAR,
    role               VARCHAR NOT NULL DEFAULT 'customer' CHECK (role IN ('customer', 'admin')),
    email_verified     BOOLEAN NOT NULL DEFAULT FALSE,
    verification_token VARCHAR UNIQUE,
    login_attempts     INTEGER NOT NULL DEFAULT 0,
    lock_until         TIMESTAMPTZ,
    last_login_at      TIMESTAMPTZ,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at         TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS sessions (
    id         UUID PRIMARY KEY,
    user_id    UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    token      VARCHAR NOT NULL UNIQUE,
    user_agent VARCHAR,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS services (
    id            SERIAL PRIMARY KEY,
    name          VARCHAR NOT NULL,
    description   VARCHAR,
    volume_m3     DOUBLE PRECISION NOT NULL,
    base_price    DOUBLE PRECISION NOT NULL CHECK (base_price >= 0),
    length_m      DOUBLE PRECISION,
    width_m       DOUBLE PRECISION,
    height_m      DOUBLE PRECISION,
    included_days INTEGER NOT NULL DEFAULT 7,
    image_url     VARCHAR,
    active        BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS waste_types (
    id           SERIAL PRIMARY KEY,
    name         VARCHAR NOT NULL,
    description  VARCHAR,
    waste_code   VARCHAR,
    hazardous    BOOLEAN NOT NULL DEFAULT FALSE,
    requires_fid BOOLEAN NOT NULL DEFAULT FALSE,
    active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS time_slots (
    id               SERIAL PRIMARY KEY,
    slot_date        DATE NOT NULL,
    start_time       TIME NOT NULL,
    end_time         TIME NOT NULL,
    max_bookings     INTEGER NOT NULL CHECK (max_bookings > 0),
    current_bookings INTEGER NOT NULL DEFAULT 0,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT time_slot_capacity CHECK (current_bookings >= 0 AND current_bookings <= max_bookings),
    CONSTRAINT time_slot_unique UNIQUE (slot_date, start_time, end_time)
);

CREATE TABLE IF NOT EXISTS rental_pricing (
    id         SERIAL PRIMARY KEY,
    service_id INTEGER REFERENCES services (id) ON DELETE CASCADE,
    min_days   INTEGER NOT NULL,
    max_days   INTEGER NOT NULL,
    supplement DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CHECK (min_days <= max_days)
);

CREATE TABLE IF NOT EXISTS transport_pricing (
    id         SERIAL PRIMARY KEY,
    min_km     DOUBLE PRECISION NOT NULL,
    max_km     DOUBLE PRECISION NOT NULL,
    price      DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CHECK (min_km < max_km)
);

CREATE TABLE IF NOT EXISTS treatment_pricing (
    id            SERIAL PRIMARY KEY,
    waste_type_id INTEGER NOT NULL UNIQUE REFERENCES waste_types (id) ON DELETE CASCADE,
    price_per_ton DOUBLE PRECISION NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS cart_items (
    id                          UUID PRIMARY KEY,
    user_id                     UUID REFERENCES users (id) ON DELETE CASCADE,
    session_id                  UUID,
    service_id                  INTEGER NOT NULL REFERENCES services (id),
    waste_type_id               INTEGER NOT NULL REFERENCES waste_types (id),
    rental_days                 INTEGER NOT NULL,
    estimated_tons              DOUBLE PRECISION NOT NULL,
    delivery_slot_id            INTEGER REFERENCES time_slots (id) ON DELETE SET NULL,
    pickup_slot_id              INTEGER REFERENCES time_slots (id) ON DELETE SET NULL,
    notes                       VARCHAR,
    latitude                    DOUBLE PRECISION,
    longitude                   DOUBLE PRECISION,
    administrative_area_level_1 VARCHAR,
    administrative_area_level_2 VARCHAR,
    country                     VARCHAR,
    locality                    VARCHAR,
    postal_code                 VARCHAR,
    route                       VARCHAR,
    street_number               VARCHAR,
    address                     VARCHAR,
    place_id                    VARCHAR,
    base_price                  DOUBLE PRECISION NOT NULL,
    duration_supplement         DOUBLE PRECISION NOT NULL,
    transport_price             DOUBLE PRECISION NOT NULL,
    treatment_price             DOUBLE PRECISION NOT NULL,
    distance_km                 DOUBLE PRECISION NOT NULL,
    total_ht                    DOUBLE PRECISION NOT NULL,
    vat                         DOUBLE PRECISION NOT NULL,
    total_ttc                   DOUBLE PRECISION NOT NULL,
    created_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),

    CHECK (user_id IS NOT NULL OR session_id IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS cart_items_user_idx ON cart_items (user_id);
CREATE INDEX IF NOT EXISTS cart_items_session_idx ON cart_items (session_id);

CREATE TABLE IF NOT EXISTS orders (
    id                          UUID PRIMARY KEY,
    slug                        SERIAL UNIQUE,
    user_id                     UUID NOT NULL REFERENCES users (id),
    customer_email              VARCHAR NOT NULL,
    customer_first_name         VARCHAR NOT NULL,
    customer_last_name          VARCHAR NOT NULL,
    customer_phone              VARCHAR,
    customer_company            VARCHAR,
    service_id                  INTEGER NOT NULL REFERENCES services (id),
    service_name                VARCHAR NOT NULL,
    waste_type_id               INTEGER NOT NULL REFERENCES waste_types (id),
    waste_type_name             VARCHAR NOT NULL,
    rental_days                 INTEGER NOT NULL,
    estimated_tons              DOUBLE PRECISION NOT NULL,
    delivery_slot_id            INTEGER REFERENCES time_slots (id) ON DELETE SET NULL,
    pickup_slot_id              INTEGER REFERENCES time_slots (id) ON DELETE SET NULL,
    notes                       VARCHAR,
    latitude                    DOUBLE PRECISION,
    longitude                   DOUBLE PRECISION,
    administrative_area_level_1 VARCHAR,
    administrative_area_level_2 VARCHAR,
    country                     VARCHAR,
    locality                    VARCHAR,
    postal_code                 VARCHAR,
    route                       VARCHAR,
    street_number               VARCHAR,
    address                     VARCHAR,
    place_id                    VARCHAR,
    delivery_date               DATE,
    pickup_date                 DATE,
    proposed_delivery_date      DATE,
    delivery_date_status        VARCHAR CHECK (delivery_date_status IN ('proposed', 'accepted', 'rejected')),
    base_price                  DOUBLE PRECISION NOT NULL,
    duration_supplement         DOUBLE PRECISION NOT NULL,
    transport_price             DOUBLE PRECISION NOT NULL,
    treatment_price             DOUBLE PRECISION NOT NULL,
    distance_km                 DOUBLE PRECISION NOT NULL,
    total_ht                    DOUBLE PRECISION NOT NULL,
    vat                         DOUBLE PRECISION NOT NULL,
    total_ttc                   DOUBLE PRECISION NOT NULL,
    status                      VARCHAR NOT NULL
        CHECK (status IN ('pending', 'confirmed', 'delivered', 'collected', 'completed', 'cancelled')),
    payment_status              VARCHAR NOT NULL CHECK (payment_status IN ('pending', 'paid', 'failed', 'refunded')),
    payment_intent_id           VARCHAR,
    admin_comment               VARCHAR,
    created_at                  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at                  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS orders_user_idx ON orders (user_id);
CREATE INDEX IF NOT EXISTS orders_payment_intent_idx ON orders (payment_intent_id);

CREATE TABLE IF NOT EXISTS audit_logs (
    id          UUID PRIMARY KEY,
    entity_type VARCHAR NOT NULL,
    entity_id   VARCHAR NOT NULL,
    action      VARCHAR NOT NULL,
    actor_id    UUID,
    details     JSONB NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS audit_logs_entity_idx ON audit_logs (entity_type, entity_id);

CREATE TABLE IF NOT EXISTS email_logs (
    id         UUID PRIMARY KEY,
    recipient  VARCHAR NOT NULL,
    template   VARCHAR NOT NULL,
    subject    VARCHAR NOT NULL,
    status     VARCHAR NOT NULL CHECK (status IN ('sent', 'failed', 'skipped')),
    error      VARCHAR,
    order_id   UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS company_activities (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    company_name  VARCHAR NOT NULL,
    email         VARCHAR NOT NULL,
    phone         VARCHAR NOT NULL,
    address       VARCHAR NOT NULL,
    opening_hours VARCHAR NOT NULL,
    activities    TEXT[] NOT NULL DEFAULT '{}',
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS abandoned_checkouts (
    order_id     UUID PRIMARY KEY REFERENCES orders (id) ON DELETE CASCADE,
    user_id      UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    email        VARCHAR NOT NULL,
    amount_ttc   DOUBLE PRECISION NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    reminded_at  TIMESTAMPTZ,
    recovered_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS inactivity_notifications (
    id            UUID PRIMARY KEY,
    user_id       UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    email         VARCHAR NOT NULL,
    last_login_at TIMESTAMPTZ,
    notified_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS fid_documents (
    id                      UUID PRIMARY KEY,
    user_id                 UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    order_id                UUID REFERENCES orders (id) ON DELETE SET NULL,
    status                  VARCHAR NOT NULL CHECK (status IN ('draft', 'submitted', 'validated', 'rejected')),
    producer_name           VARCHAR NOT NULL,
    producer_siret          VARCHAR NOT NULL,
    producer_address        VARCHAR NOT NULL,
    producer_contact_name   VARCHAR NOT NULL,
    producer_email          VARCHAR NOT NULL,
    producer_phone          VARCHAR NOT NULL,
    waste_code              VARCHAR NOT NULL,
    waste_description       VARCHAR NOT NULL,
    waste_origin            VARCHAR NOT NULL,
    estimated_quantity_tons DOUBLE PRECISION NOT NULL,
    physical_state          VARCHAR NOT NULL,
    packaging               VARCHAR NOT NULL,
    hazardous               BOOLEAN NOT NULL,
    admin_comment           VARCHAR,
    submitted_at            TIMESTAMPTZ,
    reviewed_at             TIMESTAMPTZ,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

/// Creates missing tables and seeds the company row.
pub async fn run(db_pool: &DbPool) -> Result<(), FailureError> {
    let conn = db_pool.get().await?;
    conn.batch_execute(SCHEMA).await?;

    let company_repo = repos::company::make_repo();
    if company_repo.select_one(&*conn, CompanyActivitiesFilter).await?.is_none() {
        info!("Seeding company activities");
        company_repo.insert_exactly_one(&*conn, NewCompanyActivities::default()).await?;
    }

    Ok(())
}
