// Integration tests

mod enrollment_test;
mod payment_intent_test;
mod race_condition_test;
mod settlement_test;
