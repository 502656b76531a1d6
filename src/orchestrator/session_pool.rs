//! 会话池 - 编排层
//!
//! ## 职责
//!
//! - 批次开始时按配置数量（1-5）创建会话，可选地对每个会话认证一次
//! - 按轮询规则分配：第 i 个任务使用槽位 `i mod 会话数`
//! - 通过移出 / 归还转移会话的所有权，同一会话不会被两个任务同时使用
//! - 批次结束时关闭每个会话，且只关闭一次
//!
//! 创建失败的槽位直接跳过，只要至少有一个会话就继续运行。

use tracing::{error, info, warn};

use crate::config::clamp_workers;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{Session, SessionFactory};
use crate::models::Credentials;

pub struct SessionPool<S: Session> {
    slots: Vec<Option<S>>,
}

impl<S: Session> SessionPool<S> {
    /// 创建会话池
    pub async fn build<F>(factory: &F, requested: usize, credentials: Option<&Credentials>) -> AppResult<Self>
    where
        F: SessionFactory<Session = S>,
    {
        let size = clamp_workers(requested);
        if size != requested {
            warn!("⚠️ 会话数 {} 超出范围，已调整为 {}", requested, size);
        }
        if credentials.is_none() {
            warn!("⚠️ 未提供登录凭据，以匿名方式继续，部分内容可能无法访问");
        }

        let mut slots = Vec::with_capacity(size);
        for slot in 0..size {
            let mut session = match factory.create(slot).await {
                Ok(session) => session,
                Err(e) => {
                    error!("❌ 会话 #{} 创建失败，跳过该槽位: {}", slot, e);
                    continue;
                }
            };

            if let Some(credentials) = credentials {
                if let Err(e) = session.authenticate(credentials).await {
                    warn!("⚠️ {} 认证失败，以未登录状态继续: {}", session.label(), e);
                }
            }
            slots.push(Some(session));
        }

        if slots.is_empty() {
            return Err(AppError::NoSessions { requested: size });
        }
        if slots.len() < size {
            warn!("⚠️ 会话池降级运行: {}/{} 个会话可用", slots.len(), size);
        } else {
            info!("✓ 会话池就绪: {} 个会话", slots.len());
        }

        Ok(Self { slots })
    }

    /// 直接用已有会话组成池（不做认证）
    pub fn from_sessions(sessions: Vec<S>) -> AppResult<Self> {
        if sessions.is_empty() {
            return Err(AppError::NoSessions { requested: 0 });
        }
        Ok(Self {
            slots: sessions.into_iter().map(Some).collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// 第 `index` 个任务对应的槽位，与完成顺序无关
    pub fn slot_for(&self, index: usize) -> usize {
        index % self.slots.len()
    }

    /// 借出第 `index` 个任务对应的会话（会话当前在池中时）
    pub fn acquire(&mut self, index: usize) -> Option<&mut S> {
        let slot = self.slot_for(index);
        self.slots[slot].as_mut()
    }

    /// 把所有会话移出池，交给各自的执行通道
    pub fn check_out_all(&mut self) -> Vec<(usize, S)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, session)| session.take().map(|s| (slot, s)))
            .collect()
    }

    /// 归还会话
    pub fn check_in(&mut self, slot: usize, session: S) {
        if let Some(entry) = self.slots.get_mut(slot) {
            if entry.is_some() {
                warn!("槽位 #{} 已有会话，旧会话被替换", slot);
            }
            *entry = Some(session);
        }
    }

    /// 关闭池中所有会话，错误只记录不返回
    pub async fn shutdown(mut self) -> usize {
        let mut closed = 0;
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            match entry.take() {
                Some(mut session) => {
                    if let Err(e) = session.close().await {
                        warn!("关闭 {} 失败: {}", session.label(), e);
                    }
                    closed += 1;
                }
                None => warn!("槽位 #{} 的会话未归还，随任务一起释放", slot),
            }
        }
        info!("已关闭 {} 个会话", closed);
        closed
    }
}
