//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    instance_flow_event (seq) {
        seq -> BigInt,
        source_application_id -> BigInt,
        source_application_integration_id -> Text,
        source_application_instance_id -> Text,
        integration_id -> BigInt,
        instance_id -> Nullable<BigInt>,
        category -> Text,
        event_type -> Text,
        ts -> Timestamptz,
        correlation_id -> Uuid,
        destination_id -> Nullable<Text>,
        producer -> Nullable<Text>,
        errors -> Jsonb,
        fingerprint -> Text,
        ingested_at -> Timestamptz,
    }
}
