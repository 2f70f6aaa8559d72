use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use crate::execution::operator::{OpIterator, RowIterator, ensure_closed, ensure_open};
use crate::storage::row::{Field, Row};
use crate::storage::schema::{ColumnDef, FieldType, Schema};
use crate::types::{ColumnId, DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    /// Sum and count side by side, e.g. for a later weighted average
    SumCount,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::SumCount => "sum_count",
        };
        write!(f, "{s}")
    }
}

/// Grouped accumulator for one aggregate over one column.
///
/// Keeps a running value and a running count per group; rows are merged one at a
/// time and never buffered. Integer arithmetic wraps at 32 bits and AVG is the
/// truncated integer quotient. Text columns only support COUNT.
#[derive(Debug)]
pub struct Aggregator {
    group_by: Option<ColumnId>,
    agg_field: ColumnId,
    op: AggregateOp,
    values: HashMap<Option<Field>, i32>,  // None keys the single ungrouped group
    counts: HashMap<Option<Field>, i32>,
    result_schema: Arc<Schema>,
}

impl Aggregator {
    pub fn new(
        input: &Schema,
        group_by: Option<ColumnId>,
        agg_field: ColumnId,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let agg_type = input.field_type(agg_field)?;
        if matches!(agg_type, FieldType::Varchar(_)) && op != AggregateOp::Count {
            return Err(DbError::Unsupported(format!("{op} over text column {agg_field}")));
        }

        let mut columns = Vec::new();
        if let Some(group) = group_by {
            columns.push(input.columns()
                .get(group)
                .cloned()
                .ok_or_else(|| DbError::NoSuchElement(format!("column {} out of range", group)))?);
        }
        let agg_name = input.field_name(agg_field)?
            .map(str::to_string)
            .unwrap_or_else(|| format!("column{agg_field}"));
        match op {
            AggregateOp::SumCount => {
                columns.push(ColumnDef::new(FieldType::Int, format!("sum({agg_name})")));
                columns.push(ColumnDef::new(FieldType::Int, format!("count({agg_name})")));
            }
            _ => columns.push(ColumnDef::new(FieldType::Int, format!("{op}({agg_name})"))),
        }

        Ok(Aggregator {
            group_by,
            agg_field,
            op,
            values: HashMap::new(),
            counts: HashMap::new(),
            result_schema: Arc::new(Schema::new(columns)),
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn result_schema(&self) -> &Arc<Schema> {
        &self.result_schema
    }

    /// Fold one input row into its group
    pub fn merge(&mut self, row: &Row) -> DbResult<()> {
        let key = match self.group_by {
            Some(group) => Some(row.get_field(group)?.clone()),
            None => None,
        };

        let count = self.counts.entry(key.clone()).or_insert(0);
        *count = count.wrapping_add(1);

        if self.op == AggregateOp::Count {
            return Ok(());
        }

        let field = row.get_field(self.agg_field)?;
        let value = field.as_int()
            .ok_or_else(|| DbError::SchemaMismatch(format!("{} is not an integer", field)))?;

        let op = self.op;
        self.values.entry(key)
            .and_modify(|acc| {
                *acc = match op {
                    AggregateOp::Min => (*acc).min(value),
                    AggregateOp::Max => (*acc).max(value),
                    _ => acc.wrapping_add(value),
                }
            })
            .or_insert(value);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.counts.clear();
    }

    /// One result row per group, ordered by group value
    pub fn iterator(&self) -> DbResult<RowIterator> {
        let mut groups: Vec<&Option<Field>> = self.counts.keys().collect();
        groups.sort();

        let mut rows = Vec::with_capacity(groups.len());
        for key in groups {
            let count = self.counts.get(key).copied().unwrap_or(0);
            let value = self.values.get(key).copied().unwrap_or(0);

            let mut fields = Vec::with_capacity(self.result_schema.len());
            if let Some(group) = key {
                fields.push(group.clone());
            }
            match self.op {
                AggregateOp::Count => fields.push(Field::Int(count)),
                AggregateOp::Avg => fields.push(Field::Int(value.wrapping_div(count))),
                AggregateOp::SumCount => {
                    fields.push(Field::Int(value));
                    fields.push(Field::Int(count));
                }
                AggregateOp::Min | AggregateOp::Max | AggregateOp::Sum => fields.push(Field::Int(value)),
            }
            rows.push(Row::new(Arc::clone(&self.result_schema), fields)?);
        }

        Ok(RowIterator::new(Arc::clone(&self.result_schema), rows))
    }
}

/// Computes one aggregate over its child, optionally grouped by a column
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    aggregator: Aggregator,
    results: Option<RowIterator>,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        agg_field: ColumnId,
        group_by: Option<ColumnId>,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let aggregator = Aggregator::new(child.schema(), group_by, agg_field, op)?;
        Ok(Aggregate { child, aggregator, results: None })
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    // merge the whole child into fresh groups
    fn accumulate(&mut self) -> DbResult<RowIterator> {
        self.aggregator.clear();
        while let Some(row) = self.child.next()? {
            self.aggregator.merge(&row)?;
        }

        let mut results = self.aggregator.iterator()?;
        results.open()?;
        Ok(results)
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> DbResult<()> {
        ensure_closed(self.results.is_some(), "aggregate")?;
        self.child.open()?;

        match self.accumulate() {
            Ok(results) => {
                self.results = Some(results);
                Ok(())
            }
            Err(e) => {
                self.child.close();
                Err(e)
            }
        }
    }

    fn next(&mut self) -> DbResult<Option<Row>> {
        match self.results.as_mut() {
            Some(results) => results.next(),
            None => ensure_open(false, "aggregate").map(|_| None),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        match self.results.as_mut() {
            Some(results) => results.rewind(),
            None => ensure_open(false, "aggregate"),
        }
    }

    fn close(&mut self) {
        self.results = None;
        self.child.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        self.aggregator.result_schema()
    }
}
