// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use cms_sql::{Column, ConcretePredicate, Predicate, RawSegment, SQLParamContainer};

/// Renders the spatial operators for a database dialect. `geojson` is the operand bound as a
/// parameter holding a GeoJSON geometry.
pub trait GeometryHelper: Send + Sync {
    fn intersects(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate;

    fn nintersects(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate;

    fn intersects_bbox(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate;

    fn nintersects_bbox(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgisGeometryHelper;

impl PostgisGeometryHelper {
    fn geometry_call(
        prefix: &str,
        column: Column,
        infix: &str,
        geojson: SQLParamContainer,
        suffix: &str,
    ) -> ConcretePredicate {
        Predicate::Raw(vec![
            RawSegment::Sql(prefix.to_string()),
            RawSegment::Expr(column),
            RawSegment::Sql(format!("{infix}ST_GeomFromGeoJSON(")),
            RawSegment::Expr(Column::Param(geojson)),
            RawSegment::Sql(format!("){suffix}")),
        ])
    }
}

impl GeometryHelper for PostgisGeometryHelper {
    fn intersects(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate {
        Self::geometry_call("ST_Intersects(", column, ", ", geojson, ")")
    }

    fn nintersects(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate {
        Self::geometry_call("NOT ST_Intersects(", column, ", ", geojson, ")")
    }

    fn intersects_bbox(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate {
        Self::geometry_call("", column, " && ", geojson, "")
    }

    fn nintersects_bbox(&self, column: Column, geojson: SQLParamContainer) -> ConcretePredicate {
        Self::geometry_call("NOT (", column, " && ", geojson, ")")
    }
}
