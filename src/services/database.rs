use crate::error::{AppError, Result};
use crate::models::{
    custom_field::CustomField,
    followup::{FollowUp, FollowUpAttachment, FollowUpDetail},
    queue::Queue,
    ticket::{Ticket, TicketDetail},
    user::User,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// 单张表：只读访问经 `Deref` 到 `BTreeMap`，写入记录撤销日志
#[derive(Debug)]
pub struct Table<K, V> {
    rows: BTreeMap<K, V>,
    undo: Vec<(K, Option<V>)>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            undo: Vec::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
    pub fn insert(&mut self, key: K, row: V) {
        let previous = self.rows.insert(key.clone(), row);
        self.undo.push((key, previous));
    }

    /// Saves the current row to the journal before handing it out.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let row = self.rows.get_mut(key)?;
        self.undo.push((key.clone(), Some(row.clone())));
        Some(row)
    }

    fn commit(&mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(row) => {
                    self.rows.insert(key, row);
                }
                None => {
                    self.rows.remove(&key);
                }
            }
        }
    }
}

impl<K, V> Deref for Table<K, V> {
    type Target = BTreeMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.rows
    }
}

/// 全部数据表
#[derive(Debug, Default)]
pub struct Tables {
    pub queues: Table<u64, Queue>,
    pub users: Table<u64, User>,
    pub tickets: Table<u64, Ticket>,
    pub followups: Table<u64, FollowUp>,
    pub attachments: Table<u64, FollowUpAttachment>,
    pub custom_fields: Table<u64, CustomField>,
    sequences: Table<&'static str, u64>,
}

impl Tables {
    /// 自增主键
    pub fn next_id(&mut self, table: &'static str) -> u64 {
        let next = self.sequences.get(table).copied().unwrap_or(0) + 1;
        self.sequences.insert(table, next);
        next
    }

    pub fn queue(&self, id: u64) -> Result<&Queue> {
        self.queues.get(&id).ok_or_else(|| AppError::not_found("Queue"))
    }

    pub fn ticket(&self, id: u64) -> Result<&Ticket> {
        self.tickets.get(&id).ok_or_else(|| AppError::not_found("Ticket"))
    }

    pub fn ticket_mut(&mut self, id: u64) -> Result<&mut Ticket> {
        self.tickets.get_mut(&id).ok_or_else(|| AppError::not_found("Ticket"))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn queue_by_slug(&self, slug: &str) -> Option<&Queue> {
        self.queues.values().find(|q| q.slug == slug)
    }

    /// Custom field definitions in display order.
    pub fn custom_field_definitions(&self) -> Vec<CustomField> {
        let mut fields: Vec<CustomField> = self.custom_fields.values().cloned().collect();
        fields.sort_by(|a, b| a.ordering.cmp(&b.ordering).then(a.id.cmp(&b.id)));
        fields
    }

    pub fn followup_by_message_id(&self, message_id: &str) -> Option<&FollowUp> {
        self.followups
            .values()
            .find(|f| f.message_id.as_deref() == Some(message_id))
    }

    pub fn followup_detail(&self, id: u64) -> Result<FollowUpDetail> {
        let followup = self
            .followups
            .get(&id)
            .ok_or_else(|| AppError::not_found("Follow-up"))?;

        Ok(FollowUpDetail {
            followup: followup.clone(),
            user: followup.user_id.and_then(|uid| self.users.get(&uid).cloned()),
            attachments: self
                .attachments
                .values()
                .filter(|a| a.followup_id == id)
                .cloned()
                .collect(),
        })
    }

    fn commit(&mut self) {
        self.queues.commit();
        self.users.commit();
        self.tickets.commit();
        self.followups.commit();
        self.attachments.commit();
        self.custom_fields.commit();
        self.sequences.commit();
    }

    fn rollback(&mut self) {
        self.queues.rollback();
        self.users.rollback();
        self.tickets.rollback();
        self.followups.rollback();
        self.attachments.rollback();
        self.custom_fields.rollback();
        self.sequences.rollback();
    }

    /// Resolves every relation of a ticket into one snapshot.
    pub fn ticket_detail(&self, id: u64) -> Result<TicketDetail> {
        let ticket = self.ticket(id)?;
        let queue = self.queue(ticket.queue_id)?;

        let mut followups: Vec<&FollowUp> = self
            .followups
            .values()
            .filter(|f| f.ticket_id == id)
            .collect();
        followups.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

        let followups = followups
            .into_iter()
            .map(|f| self.followup_detail(f.id))
            .collect::<Result<Vec<_>>>()?;

        Ok(TicketDetail {
            ticket: ticket.clone(),
            queue: queue.clone(),
            assignee: ticket.assigned_to.and_then(|uid| self.users.get(&uid).cloned()),
            followups,
            custom_field_names: self
                .custom_field_definitions()
                .into_iter()
                .map(|f| f.name)
                .collect(),
        })
    }
}

/// 进程内存储
///
/// 读操作共享锁；写操作通过 [`Database::transaction`] 在写锁内直接修改，
/// 每次写入记录撤销日志。闭包出错 (或 panic) 时按日志回滚，不留下部分写入。
#[derive(Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
}

/// 未提交即回滚
struct Journal<'a> {
    tables: &'a mut Tables,
    committed: bool,
}

impl Drop for Journal<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tables.rollback();
        }
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read();
        f(&tables)
    }

    /// 开始事务
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.write();
        let mut journal = Journal {
            tables: &mut guard,
            committed: false,
        };

        match f(&mut *journal.tables) {
            Ok(value) => {
                journal.tables.commit();
                journal.committed = true;
                Ok(value)
            }
            Err(e) => {
                debug!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    pub fn ticket_detail(&self, id: u64) -> Result<TicketDetail> {
        self.read(|t| t.ticket_detail(id))
    }

    pub fn followup_detail(&self, id: u64) -> Result<FollowUpDetail> {
        self.read(|t| t.followup_detail(id))
    }

    pub fn ticket_ids(&self) -> Vec<u64> {
        self.read(|t| t.tickets.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(tables: &mut Tables) -> Queue {
        let queue = Queue {
            id: tables.next_id("queue"),
            title: "Test Queue".to_string(),
            slug: "test-queue".to_string(),
            default_owner: None,
        };
        tables.queues.insert(queue.id, queue.clone());
        queue
    }

    #[test]
    fn test_transaction_commits() {
        let db = Database::new();
        let created = db.transaction(|t| Ok(queue(t))).unwrap();

        assert_eq!(created.id, 1);
        assert!(db.read(|t| t.queue_by_slug("test-queue").is_some()));
    }

    #[test]
    fn test_transaction_rolls_back() {
        let db = Database::new();
        let result: Result<()> = db.transaction(|t| {
            queue(t);
            Err(AppError::field("title", "boom"))
        });

        assert!(result.is_err());
        assert!(db.read(|t| t.queues.is_empty()));
        // sequence is rolled back as well
        let created = db.transaction(|t| Ok(queue(t))).unwrap();
        assert_eq!(created.id, 1);
    }

    #[test]
    fn test_rollback_restores_modified_rows() {
        let db = Database::new();
        db.transaction(|t| Ok(queue(t))).unwrap();

        let result: Result<()> = db.transaction(|t| {
            let existing = t.queues.get_mut(&1).ok_or_else(|| AppError::not_found("Queue"))?;
            existing.title = "Renamed".to_string();
            queue(t);
            Err(AppError::field("title", "boom"))
        });

        assert!(result.is_err());
        db.read(|t| {
            assert_eq!(t.queues.len(), 1);
            assert_eq!(t.queues[&1].title, "Test Queue");
        });
    }

    #[test]
    fn test_rollback_on_panic() {
        let db = Database::new();
        let writer = db.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = writer.transaction(|t| -> Result<()> {
                queue(t);
                panic!("writer crashed");
            });
        }));

        assert!(outcome.is_err());
        assert!(db.read(|t| t.queues.is_empty()));
    }

    #[test]
    fn test_missing_ticket() {
        let db = Database::new();
        assert!(matches!(db.ticket_detail(42), Err(AppError::NotFound(_))));
    }
}
