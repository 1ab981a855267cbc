//! PostgreSQL implementation of the rule store.
//!
//! Tables are created by `migrations/0001_init.sql`. All statements use
//! bound parameters. Name lookups follow the in-memory store: the lowest id
//! with a matching name wins. Mapping tables carry a serial id so member
//! lists come back in insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{error, info};

use vee_rules::schema::{
    Condition, GroupId, HeadGroup, HeadGroupKey, NewHeadGroup, NewRule, NewRuleGroup, Rule,
    RuleGroup, RuleGroupRef, RuleId,
};
use vee_rules::store::{check_group_name, RuleAdmin, RuleStore, StoreError, StoreResult};

const RULE_COLUMNS: &str = "SELECT r.id, r.name, r.description, r.is_active,
        c.field_name, c.condition_type, c.value, c.created_at, c.updated_at
     FROM rules r
     JOIN rulesconditions c ON c.rule_id = r.id";

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: i64,
    name: String,
    description: String,
    is_active: bool,
    field_name: String,
    condition_type: String,
    value: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        let mut condition = Condition::new(row.field_name, row.condition_type, row.value);
        condition.created_at = Some(row.created_at);
        condition.updated_at = Some(row.updated_at);
        Rule {
            id: row.id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            condition,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: String,
}

#[derive(Debug, sqlx::FromRow)]
struct HeadGroupRow {
    id: i64,
    name: String,
    description: String,
    meter_type: String,
    load_type: String,
}

/// Rule store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn pairs(&self, sql: &'static str) -> StoreResult<HashMap<i64, Vec<i64>>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(collect_pairs(rows))
    }
}

// ── Error mapping ───────────────────────────────────────────────────

fn db_err(e: sqlx::Error) -> StoreError {
    error!("rule store database error: {}", e);
    StoreError::Backend(e.to_string())
}

fn map_unique_violation(e: sqlx::Error, entity: &'static str, name: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::duplicate(entity, name);
        }
    }
    db_err(e)
}

/// Group `(owner, member)` rows by owner, keeping row order.
fn collect_pairs(rows: Vec<(i64, i64)>) -> HashMap<i64, Vec<i64>> {
    let mut out: HashMap<i64, Vec<i64>> = HashMap::new();
    for (owner, member) in rows {
        out.entry(owner).or_default().push(member);
    }
    out
}

// ── Name resolution ─────────────────────────────────────────────────

async fn id_by_name(
    conn: &mut PgConnection,
    sql: &'static str,
    entity: &'static str,
    name: &str,
) -> StoreResult<i64> {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(name)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::not_found(entity, name))
}

async fn rule_id(conn: &mut PgConnection, name: &str) -> StoreResult<RuleId> {
    id_by_name(
        conn,
        "SELECT id FROM rules WHERE name = $1 ORDER BY id LIMIT 1",
        "rule",
        name,
    )
    .await
}

async fn group_id(conn: &mut PgConnection, name: &str) -> StoreResult<GroupId> {
    id_by_name(conn, "SELECT id FROM rulegroups WHERE name = $1", "rule group", name).await
}

async fn head_group_id_by_name(conn: &mut PgConnection, name: &str) -> StoreResult<GroupId> {
    id_by_name(conn, "SELECT id FROM headgroups WHERE name = $1", "head group", name).await
}

/// Every name must resolve before anything is written.
async fn rule_ids(conn: &mut PgConnection, names: &[String]) -> StoreResult<Vec<RuleId>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(rule_id(&mut *conn, name).await?);
    }
    Ok(ids)
}

async fn group_ids(conn: &mut PgConnection, names: &[String]) -> StoreResult<Vec<GroupId>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(group_id(&mut *conn, name).await?);
    }
    Ok(ids)
}

// ── Read side ───────────────────────────────────────────────────────

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn rules_by_ids(&self, ids: &[RuleId]) -> StoreResult<Vec<Rule>> {
        let sql = format!("{RULE_COLUMNS} WHERE r.id = ANY($1) ORDER BY r.id");
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn head_group_id(&self, key: &HeadGroupKey) -> StoreResult<Option<GroupId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM headgroups WHERE meter_type = $1 AND load_type = $2
             ORDER BY id LIMIT 1",
        )
        .bind(&key.meter_type)
        .bind(&key.load_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn rule_groups_for_head_group(&self, head_group_id: GroupId) -> StoreResult<Vec<GroupId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT rule_group_id FROM headgroups_rulegroups_mapping
             WHERE head_group_id = $1 ORDER BY id",
        )
        .bind(head_group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn rules_for_rule_group(&self, rule_group_id: GroupId) -> StoreResult<Vec<RuleId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT rule_id FROM rulegroupmapping WHERE rule_group_id = $1 ORDER BY id",
        )
        .bind(rule_group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn direct_rules_for_head_group(&self, head_group_id: GroupId) -> StoreResult<Vec<RuleId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT rule_id FROM headgroups_rules_mapping WHERE head_group_id = $1 ORDER BY id",
        )
        .bind(head_group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn groups_for_rule(&self, rule_id: RuleId) -> StoreResult<Vec<RuleGroupRef>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT g.id, g.name
             FROM rulegroupmapping m
             JOIN rulegroups g ON g.id = m.rule_group_id
             WHERE m.rule_id = $1
             ORDER BY g.id",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| RuleGroupRef { id, name })
            .collect())
    }
}

// ── Administration ──────────────────────────────────────────────────

#[async_trait]
impl RuleAdmin for PgRuleStore {
    async fn create_rule(&self, new: NewRule) -> StoreResult<Rule> {
        let condition_type = new.condition.condition_type.as_str().to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM rules r JOIN rulesconditions c ON c.rule_id = r.id
                WHERE r.name = $1 AND c.field_name = $2 AND c.condition_type = $3 AND c.value = $4
             )",
        )
        .bind(&new.name)
        .bind(&new.condition.field_name)
        .bind(&condition_type)
        .bind(&new.condition.value)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if exists {
            return Err(StoreError::duplicate("rule", new.name));
        }

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO rules (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let (created_at, updated_at) = sqlx::query_as::<_, (DateTime<Utc>, DateTime<Utc>)>(
            "INSERT INTO rulesconditions (rule_id, field_name, condition_type, value)
             VALUES ($1, $2, $3, $4)
             RETURNING created_at, updated_at",
        )
        .bind(id)
        .bind(&new.condition.field_name)
        .bind(&condition_type)
        .bind(&new.condition.value)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!(rule_id = id, name = %new.name, "rule created");

        let mut condition = new.condition;
        condition.created_at = Some(created_at);
        condition.updated_at = Some(updated_at);
        Ok(Rule {
            id,
            name: new.name,
            description: new.description,
            is_active: true,
            condition,
        })
    }

    async fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        let sql = format!("{RULE_COLUMNS} ORDER BY r.id");
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn rules_by_names(&self, names: &[String]) -> StoreResult<Vec<Rule>> {
        let sql = format!("{RULE_COLUMNS} WHERE r.name = ANY($1) ORDER BY r.id");
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            return Err(StoreError::not_found("rule", names.join(", ")));
        }
        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn delete_rule(&self, name: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM rules WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("rule", name));
        }
        info!(name, deleted = result.rows_affected(), "rule deleted");
        Ok(())
    }

    async fn set_rules_active(&self, names: &[String], active: bool) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE rules SET is_active = $2, updated_at = now() WHERE name = ANY($1)",
        )
        .bind(names)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn create_group(&self, new: NewRuleGroup) -> StoreResult<RuleGroup> {
        check_group_name(&new.name)?;
        let row = sqlx::query_as::<_, GroupRow>(
            "INSERT INTO rulegroups (name, description) VALUES ($1, $2)
             RETURNING id, name, description",
        )
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "rule group", &new.name))?;
        info!(group_id = row.id, name = %row.name, "rule group created");
        Ok(RuleGroup {
            id: row.id,
            name: row.name,
            description: row.description,
            rule_ids: Vec::new(),
        })
    }

    async fn list_groups(&self) -> StoreResult<Vec<RuleGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, description FROM rulegroups ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let mut members = self
            .pairs("SELECT rule_group_id, rule_id FROM rulegroupmapping ORDER BY id")
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| RuleGroup {
                rule_ids: members.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                description: row.description,
            })
            .collect())
    }

    async fn delete_group(&self, name: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM rulegroups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("rule group", name));
        }
        info!(name, "rule group deleted");
        Ok(())
    }

    async fn add_rules_to_group(&self, group: &str, rules: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let owner = group_id(&mut tx, group).await?;
        let ids = rule_ids(&mut tx, rules).await?;
        for id in ids {
            sqlx::query(
                "INSERT INTO rulegroupmapping (rule_group_id, rule_id) VALUES ($1, $2)
                 ON CONFLICT (rule_group_id, rule_id) DO NOTHING",
            )
            .bind(owner)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn remove_rules_from_group(&self, group: &str, rules: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let owner = group_id(&mut tx, group).await?;
        let ids = rule_ids(&mut tx, rules).await?;
        sqlx::query("DELETE FROM rulegroupmapping WHERE rule_group_id = $1 AND rule_id = ANY($2)")
            .bind(owner)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn create_head_group(&self, new: NewHeadGroup) -> StoreResult<HeadGroup> {
        let row = sqlx::query_as::<_, HeadGroupRow>(
            "INSERT INTO headgroups (name, description, meter_type, load_type)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, description, meter_type, load_type",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.meter_type)
        .bind(&new.load_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "head group", &new.name))?;
        info!(head_group_id = row.id, name = %row.name, "head group created");
        Ok(HeadGroup {
            id: row.id,
            name: row.name,
            description: row.description,
            meter_type: row.meter_type,
            load_type: row.load_type,
            rule_group_ids: Vec::new(),
            rule_ids: Vec::new(),
        })
    }

    async fn list_head_groups(&self) -> StoreResult<Vec<HeadGroup>> {
        let rows = sqlx::query_as::<_, HeadGroupRow>(
            "SELECT id, name, description, meter_type, load_type FROM headgroups ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let mut groups = self
            .pairs("SELECT head_group_id, rule_group_id FROM headgroups_rulegroups_mapping ORDER BY id")
            .await?;
        let mut direct = self
            .pairs("SELECT head_group_id, rule_id FROM headgroups_rules_mapping ORDER BY id")
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| HeadGroup {
                rule_group_ids: groups.remove(&row.id).unwrap_or_default(),
                rule_ids: direct.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                description: row.description,
                meter_type: row.meter_type,
                load_type: row.load_type,
            })
            .collect())
    }

    async fn delete_head_group(&self, name: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM headgroups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("head group", name));
        }
        info!(name, "head group deleted");
        Ok(())
    }

    async fn add_rules_to_head_group(&self, head_group: &str, rules: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let hg_id = head_group_id_by_name(&mut tx, head_group).await?;
        let ids = rule_ids(&mut tx, rules).await?;
        for id in ids {
            sqlx::query(
                "INSERT INTO headgroups_rules_mapping (head_group_id, rule_id) VALUES ($1, $2)
                 ON CONFLICT (head_group_id, rule_id) DO NOTHING",
            )
            .bind(hg_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn remove_rules_from_head_group(
        &self,
        head_group: &str,
        rules: &[String],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let hg_id = head_group_id_by_name(&mut tx, head_group).await?;
        let ids = rule_ids(&mut tx, rules).await?;
        sqlx::query(
            "DELETE FROM headgroups_rules_mapping WHERE head_group_id = $1 AND rule_id = ANY($2)",
        )
        .bind(hg_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn add_groups_to_head_group(&self, head_group: &str, groups: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let hg_id = head_group_id_by_name(&mut tx, head_group).await?;
        let ids = group_ids(&mut tx, groups).await?;
        for id in ids {
            sqlx::query(
                "INSERT INTO headgroups_rulegroups_mapping (head_group_id, rule_group_id)
                 VALUES ($1, $2)
                 ON CONFLICT (head_group_id, rule_group_id) DO NOTHING",
            )
            .bind(hg_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn remove_groups_from_head_group(
        &self,
        head_group: &str,
        groups: &[String],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let hg_id = head_group_id_by_name(&mut tx, head_group).await?;
        let ids = group_ids(&mut tx, groups).await?;
        sqlx::query(
            "DELETE FROM headgroups_rulegroups_mapping
             WHERE head_group_id = $1 AND rule_group_id = ANY($2)",
        )
        .bind(hg_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vee_rules::schema::ConditionType;

    #[test]
    fn collect_pairs_keeps_member_order() {
        let grouped = collect_pairs(vec![(1, 5), (2, 7), (1, 3), (1, 5)]);
        assert_eq!(grouped[&1], vec![5, 3, 5]);
        assert_eq!(grouped[&2], vec![7]);
    }

    #[test]
    fn rule_row_converts_to_rule() {
        let now = Utc::now();
        let rule = Rule::from(RuleRow {
            id: 3,
            name: "ImportVAhCheck".into(),
            description: "no negative import".into(),
            is_active: false,
            field_name: "import_VAh".into(),
            condition_type: "GREATER_THAN_OR_EQUAL_TO".into(),
            value: "0".into(),
            created_at: now,
            updated_at: now,
        });
        assert_eq!(rule.id, 3);
        assert!(!rule.is_active);
        assert_eq!(rule.condition.condition_type, ConditionType::GreaterThanOrEqualTo);
        assert_eq!(rule.condition.created_at, Some(now));
    }

    #[test]
    fn non_database_errors_map_to_backend() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, "rule group", "Energy");
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn reserved_group_name_rejected_before_insert() {
        // Lazy pool: the name check must fail without a connection attempt.
        let pool = PgPool::connect_lazy("postgres://vee@127.0.0.1:1/unused").unwrap();
        let err = PgRuleStore::new(pool)
            .create_group(NewRuleGroup {
                name: "total_size".into(),
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
    }
}
