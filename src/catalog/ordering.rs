//! Dense, gap-free `sort_order` maintenance inside a partition.
//!
//! Placement is split in two: `plan` decides the target slot and the sibling
//! range to shift from the partition's current maximum, and `place_at_order`
//! applies that plan inside the caller's transaction after taking a
//! partition-scoped advisory lock. The lock serializes every reindex on the
//! same partition, so two concurrent appends can never read the same maximum.

use sqlx::PgConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{bound_lock_wait, CatalogError};

/// The collections that keep a dense `sort_order` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Banners,
    Testimonials,
    Products,
}

impl Collection {
    const fn table(self) -> &'static str {
        match self {
            Self::Banners => "banners",
            Self::Testimonials => "testimonials",
            Self::Products => "products",
        }
    }

    /// SQL predicate selecting the partition; `$1` is always the partition key.
    const fn scope(self) -> &'static str {
        match self {
            Self::Products => "category_id = $1",
            Self::Banners | Self::Testimonials => "$1::uuid IS NULL",
        }
    }
}

/// Scope inside which orders are unique and dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    collection: Collection,
    key: Option<Uuid>,
}

impl Partition {
    #[must_use]
    pub const fn banners() -> Self {
        Self {
            collection: Collection::Banners,
            key: None,
        }
    }

    #[must_use]
    pub const fn testimonials() -> Self {
        Self {
            collection: Collection::Testimonials,
            key: None,
        }
    }

    /// Products are ordered per category.
    #[must_use]
    pub const fn products_in(category_id: Uuid) -> Self {
        Self {
            collection: Collection::Products,
            key: Some(category_id),
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    fn lock_name(&self) -> String {
        match self.key {
            Some(key) => format!("{}:{key}", self.collection.table()),
            None => self.collection.table().to_string(),
        }
    }
}

/// A caller-supplied 1-based position. Zero, negatives and non-integers are
/// rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestedOrder(i32);

impl RequestedOrder {
    /// # Errors
    /// Returns `Invalid` when `value` is not in `1..=i32::MAX`.
    pub fn new(value: i64) -> Result<Self, CatalogError> {
        match i32::try_from(value) {
            Ok(order) if order > 0 => Ok(Self(order)),
            _ => Err(CatalogError::invalid("order must be a positive integer")),
        }
    }

    /// Parses form input such as `"3"`. Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// Returns `Invalid` for anything that is not a positive integer.
    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        input
            .trim()
            .parse::<i64>()
            .map_err(|_| CatalogError::invalid("order must be a positive integer"))
            .and_then(Self::new)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

/// Sibling range `[from, to]` whose orders move by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub from: i32,
    pub to: i32,
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Order the placed entity ends up with.
    pub target: i32,
    /// Siblings to shift first; never includes the placed entity.
    pub shift: Option<Shift>,
}

/// Computes where an entity lands and which siblings make room.
///
/// `current_max` is the highest order in the partition (0 when empty).
/// `current` is the entity's present order for a move, `None` for an insert.
///
/// An insert at or past the tail (`requested >= current_max`) appends at
/// `current_max + 1`; otherwise every sibling at or after the requested slot
/// moves down by one. A move compares the request against the highest order of
/// the other siblings: at or past it the entity lands on the tail, otherwise
/// only the siblings strictly between the old and new slot shift.
#[must_use]
pub fn plan(current_max: i32, requested: RequestedOrder, current: Option<i32>) -> Plan {
    let requested = requested.get();

    let Some(position) = current else {
        if requested >= current_max {
            return Plan {
                target: current_max + 1,
                shift: None,
            };
        }
        return Plan {
            target: requested,
            shift: Some(Shift {
                from: requested,
                to: current_max,
                delta: 1,
            }),
        };
    };

    let tail = current_max.max(position);
    let siblings_max = if position == tail { tail - 1 } else { tail };
    let target = if requested >= siblings_max {
        tail
    } else {
        requested
    };
    let shift = match target.cmp(&position) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => Some(Shift {
            from: target,
            to: position - 1,
            delta: 1,
        }),
        std::cmp::Ordering::Greater => Some(Shift {
            from: position + 1,
            to: target,
            delta: -1,
        }),
    };

    Plan { target, shift }
}

/// Places an entity at `requested` within `partition` and returns the order it
/// must be stored with.
///
/// For a move (`entity = Some(id)`) the entity's own row is updated here. For an
/// insert the caller writes the new row with the returned order in the same
/// transaction. Must run inside a transaction: the advisory lock is released on
/// commit or rollback.
///
/// # Errors
/// `NotFound` when the moved entity is not in the partition, `Transient` when
/// the partition lock cannot be taken in time, `Database` otherwise.
#[instrument(skip(conn))]
pub async fn place_at_order(
    conn: &mut PgConnection,
    partition: Partition,
    requested: RequestedOrder,
    entity: Option<Uuid>,
) -> Result<i32, CatalogError> {
    lock_partition(conn, partition).await?;

    let current_max = current_max(conn, partition).await?;
    let current = match entity {
        Some(id) => Some(
            current_position(conn, partition, id)
                .await?
                .ok_or_else(|| CatalogError::not_found("Entity not found in partition"))?,
        ),
        None => None,
    };

    let plan = plan(current_max, requested, current);
    debug!(current_max, ?current, ?plan, "reindex plan");

    if let Some(shift) = plan.shift {
        apply_shift(conn, partition, shift, entity).await?;
    }

    if let Some(id) = entity {
        if current != Some(plan.target) {
            let sql = format!(
                "UPDATE {} SET sort_order = $2, updated_at = NOW() WHERE id = $3 AND {}",
                partition.collection.table(),
                partition.collection.scope()
            );
            sqlx::query(&sql)
                .bind(partition.key)
                .bind(plan.target)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(plan.target)
}

/// Next free order at the tail of `partition`, without reserving it.
///
/// # Errors
/// Returns `Database` on query failure.
pub async fn next_order(conn: &mut PgConnection, partition: Partition) -> Result<i32, CatalogError> {
    Ok(current_max(conn, partition).await? + 1)
}

async fn lock_partition(conn: &mut PgConnection, partition: Partition) -> Result<(), CatalogError> {
    bound_lock_wait(conn).await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(partition.lock_name())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn current_max(conn: &mut PgConnection, partition: Partition) -> Result<i32, CatalogError> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order), 0) FROM {} WHERE {}",
        partition.collection.table(),
        partition.collection.scope()
    );
    let max = sqlx::query_scalar::<_, i32>(&sql)
        .bind(partition.key)
        .fetch_one(&mut *conn)
        .await?;
    Ok(max)
}

async fn current_position(
    conn: &mut PgConnection,
    partition: Partition,
    id: Uuid,
) -> Result<Option<i32>, CatalogError> {
    let sql = format!(
        "SELECT sort_order FROM {} WHERE id = $2 AND {}",
        partition.collection.table(),
        partition.collection.scope()
    );
    let position = sqlx::query_scalar::<_, i32>(&sql)
        .bind(partition.key)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(position)
}

async fn apply_shift(
    conn: &mut PgConnection,
    partition: Partition,
    shift: Shift,
    exclude: Option<Uuid>,
) -> Result<u64, CatalogError> {
    let sql = format!(
        "UPDATE {} SET sort_order = sort_order + $2, updated_at = NOW() \
         WHERE {} AND sort_order BETWEEN $3 AND $4 AND id IS DISTINCT FROM $5",
        partition.collection.table(),
        partition.collection.scope()
    );
    let shifted = sqlx::query(&sql)
        .bind(partition.key)
        .bind(shift.delta)
        .bind(shift.from)
        .bind(shift.to)
        .bind(exclude)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// In-memory partition: `(id, order)` pairs driven through `plan`.
    #[derive(Default)]
    struct Model {
        rows: Vec<(u32, i32)>,
        next_id: u32,
    }

    impl Model {
        fn with(count: u32) -> Self {
            let mut model = Self::default();
            for order in 1..=count {
                model.insert(order as i64);
            }
            model
        }

        fn max(&self) -> i32 {
            self.rows.iter().map(|(_, order)| *order).max().unwrap_or(0)
        }

        fn order_of(&self, id: u32) -> i32 {
            self.rows.iter().find(|(row, _)| *row == id).unwrap().1
        }

        fn apply(&mut self, requested: i64, entity: Option<u32>) -> i32 {
            let requested = RequestedOrder::new(requested).unwrap();
            let current = entity.map(|id| self.order_of(id));
            let plan = plan(self.max(), requested, current);
            if let Some(shift) = plan.shift {
                for (id, order) in &mut self.rows {
                    if Some(*id) != entity && (shift.from..=shift.to).contains(order) {
                        *order += shift.delta;
                    }
                }
            }
            match entity {
                Some(id) => {
                    for (row, order) in &mut self.rows {
                        if *row == id {
                            *order = plan.target;
                        }
                    }
                }
                None => {
                    self.next_id += 1;
                    self.rows.push((self.next_id, plan.target));
                }
            }
            plan.target
        }

        fn insert(&mut self, requested: i64) -> u32 {
            self.apply(requested, None);
            self.next_id
        }

        fn assert_dense(&self) {
            let mut orders: Vec<i32> = self.rows.iter().map(|(_, order)| *order).collect();
            orders.sort_unstable();
            let expected: Vec<i32> = (1..=self.rows.len() as i32).collect();
            assert_eq!(orders, expected);
        }
    }

    #[test]
    fn requested_order_rejects_non_positive_and_non_integer() {
        for input in ["0", "-1", "1.5", "abc", "", "99999999999"] {
            assert!(
                matches!(RequestedOrder::parse(input), Err(CatalogError::Invalid(_))),
                "{input:?} should be rejected"
            );
        }
        assert_eq!(RequestedOrder::parse(" 3 ").map(RequestedOrder::get).ok(), Some(3));
    }

    #[test]
    fn empty_partition_starts_at_one() {
        let plan = plan(0, RequestedOrder::new(7).unwrap(), None);
        assert_eq!(
            plan,
            Plan {
                target: 1,
                shift: None
            }
        );
    }

    #[test]
    fn insert_in_the_middle_shifts_the_tail() {
        let mut model = Model::with(3);
        let new = model.insert(2);
        assert_eq!(model.order_of(1), 1);
        assert_eq!(model.order_of(new), 2);
        assert_eq!(model.order_of(2), 3);
        assert_eq!(model.order_of(3), 4);
        model.assert_dense();
    }

    #[test]
    fn insert_past_the_tail_appends() {
        let mut model = Model::with(3);
        for requested in [4, 5, 100] {
            let expected = model.max() + 1;
            assert_eq!(model.apply(requested, None), expected);
        }
        model.assert_dense();
    }

    #[test]
    fn insert_at_the_tail_appends() {
        let plan = plan(3, RequestedOrder::new(3).unwrap(), None);
        assert_eq!(
            plan,
            Plan {
                target: 4,
                shift: None
            }
        );

        let mut model = Model::with(3);
        let new = model.insert(3);
        assert_eq!(model.order_of(3), 3);
        assert_eq!(model.order_of(new), 4);
        model.assert_dense();
    }

    #[test]
    fn insert_just_before_the_tail_shifts_it() {
        let plan = plan(3, RequestedOrder::new(2).unwrap(), None);
        assert_eq!(
            plan,
            Plan {
                target: 2,
                shift: Some(Shift {
                    from: 2,
                    to: 3,
                    delta: 1
                })
            }
        );
    }

    #[test]
    fn move_to_the_siblings_tail_lands_on_the_tail() {
        let mut model = Model::with(5);
        // id 2 asks for 5, the highest order among the others
        assert_eq!(model.apply(5, Some(2)), 5);
        assert_eq!(model.order_of(3), 2);
        assert_eq!(model.order_of(5), 4);
        model.assert_dense();

        // The tail entity asking for the highest other order stays put.
        let plan = plan(5, RequestedOrder::new(4).unwrap(), Some(5));
        assert_eq!(
            plan,
            Plan {
                target: 5,
                shift: None
            }
        );
    }

    #[test]
    fn move_up_shifts_only_the_skipped_range() {
        let mut model = Model::with(6);
        // id 5 sits at order 5 and moves to 2
        model.apply(2, Some(5));
        assert_eq!(model.order_of(5), 2);
        assert_eq!(model.order_of(1), 1);
        assert_eq!(model.order_of(2), 3);
        assert_eq!(model.order_of(3), 4);
        assert_eq!(model.order_of(4), 5);
        assert_eq!(model.order_of(6), 6);
        model.assert_dense();
    }

    #[test]
    fn move_down_pulls_the_range_up() {
        let mut model = Model::with(5);
        model.apply(4, Some(2));
        assert_eq!(model.order_of(1), 1);
        assert_eq!(model.order_of(3), 2);
        assert_eq!(model.order_of(4), 3);
        assert_eq!(model.order_of(2), 4);
        assert_eq!(model.order_of(5), 5);
        model.assert_dense();
    }

    #[test]
    fn move_past_the_tail_lands_on_the_tail() {
        let mut model = Model::with(4);
        assert_eq!(model.apply(50, Some(1)), 4);
        assert_eq!(model.order_of(2), 1);
        model.assert_dense();
    }

    #[test]
    fn move_to_the_same_slot_is_a_no_op() {
        let plan = plan(4, RequestedOrder::new(3).unwrap(), Some(3));
        assert_eq!(
            plan,
            Plan {
                target: 3,
                shift: None
            }
        );
    }

    #[test]
    fn random_sequences_stay_dense() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut model = Model::default();
        for _ in 0..500 {
            let size = model.rows.len() as i64;
            let requested = rng.gen_range(1..=size + 3);
            if size > 0 && rng.gen_bool(0.5) {
                let id = model.rows[rng.gen_range(0..model.rows.len())].0;
                model.apply(requested, Some(id));
            } else {
                model.apply(requested, None);
            }
            model.assert_dense();
        }
    }

    #[test]
    fn lock_names_are_partition_scoped() {
        let category = Uuid::nil();
        assert_eq!(Partition::banners().lock_name(), "banners");
        assert_eq!(Partition::testimonials().lock_name(), "testimonials");
        assert_eq!(
            Partition::products_in(category).lock_name(),
            format!("products:{category}")
        );
    }
}
