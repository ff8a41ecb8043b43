// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

pub const CMS_LOG: &str = "CMS_LOG";

pub const CMS_QUERY_LIMIT_MAX: &str = "CMS_QUERY_LIMIT_MAX";
pub const CMS_MAX_RELATIONAL_DEPTH: &str = "CMS_MAX_RELATIONAL_DEPTH";
pub const CMS_QUERY_STRICT_FIELDS: &str = "CMS_QUERY_STRICT_FIELDS";
