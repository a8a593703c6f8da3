use crate::component::ManagedComponent;
use crate::error::{ContainerError, ContainerResult};
use std::fmt;
use std::sync::Arc;

/// 上下文生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Discovering,
    Instantiating,
    Wiring,
    Configuring,
    Initialized,
    /// 最近一次初始化或重建失败，注册表为空
    Failed,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Discovering => "discovering",
            LifecycleState::Instantiating => "instantiating",
            LifecycleState::Wiring => "wiring",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Failed => "failed",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 回调阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookPhase {
    Initialize,
    CleanUp,
}

/// 依次执行组件的回调，第一个失败立即中止剩余回调
pub(crate) fn run_hooks<'a>(
    components: impl IntoIterator<Item = &'a Arc<ManagedComponent>>,
    phase: HookPhase,
) -> ContainerResult<usize> {
    let mut invoked = 0;
    for component in components {
        let Some(instance) = component.owned_instance() else {
            continue;
        };
        let hooks = match phase {
            HookPhase::Initialize => component.descriptor().initializers(),
            HookPhase::CleanUp => component.descriptor().clean_ups(),
        };
        for hook in hooks {
            tracing::debug!("Invoking {:?} hook '{}' on '{}'", phase, hook.name(), component.name());
            hook.invoke(instance.as_any()).map_err(|source| {
                tracing::error!(
                    "{:?} hook '{}' on '{}' failed: {}",
                    phase,
                    hook.name(),
                    component.name(),
                    source
                );
                ContainerError::LifecycleHook {
                    component: component.name().to_string(),
                    hook: hook.name().to_string(),
                    source,
                }
            })?;
            invoked += 1;
        }
    }
    Ok(invoked)
}
