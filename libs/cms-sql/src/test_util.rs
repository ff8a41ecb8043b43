// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Test assertions to check SQL statements and parameters.

/// Assert that the given parameters match the expected ones, both in value and in type.
///
/// # Usage:
/// ```no_run
/// assert_params!(actual_params, expected_param1, expected_param2, ...);
/// ```
///
/// Parameters are compared through [`crate::SQLParam::eq`], so `5` (an `i32`) does not match a
/// parameter bound as `5i64`, and `"foo"` does not match a parameter bound as `String`.
#[macro_export]
macro_rules! assert_params {
    ($actual_params:expr) => {
        assert!($actual_params.is_empty(), "Extra actual parameters: {:?}", $actual_params);
    };
    ($actual_params:expr, $($expected_param:expr),+ $(,)?) => {
        match (&$actual_params, [$(&$expected_param as &dyn $crate::SQLParam),+]) {
            (actual_params, expected_params) => {
                assert_eq!(
                    actual_params.len(),
                    expected_params.len(),
                    "Parameter count mismatch: {:?}",
                    actual_params
                );
                for (actual, expected) in actual_params.iter().zip(expected_params.iter()) {
                    let actual: &dyn $crate::SQLParam = actual.as_ref();
                    assert!(
                        $crate::SQLParam::eq(actual, *expected),
                        "Parameter mismatch: {:?} != {:?}",
                        actual,
                        expected
                    );
                }
            }
        }
    };
}

/// Assert on the `(statement, params)` pair produced by
/// [`crate::ExpressionBuilder::to_sql`].
#[macro_export]
macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        $crate::assert_params!(actual_params);
    };
    ($actual:expr, $expected_stmt:expr, $($rest:expr),+ $(,)?) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        $crate::assert_params!(actual_params, $($rest),+);
    };
}
