use std::ops::{BitOr, BitOrAssign};

/// 求值标志
///
/// 低两位选择求值类型（全局脚本或模块），其余位是修饰符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EvalFlags(u32);

impl EvalFlags {
    /// 全局脚本
    pub const GLOBAL: Self = Self(0);
    /// ES 模块
    pub const MODULE: Self = Self(1);
    /// 严格模式
    pub const STRICT: Self = Self(1 << 3);
    /// 去除调试信息
    pub const STRIP: Self = Self(1 << 4);
    /// 只编译不执行，返回字节码对象
    pub const COMPILE_ONLY: Self = Self(1 << 5);
    /// 调用栈不越过本次求值
    pub const BACKTRACE_BARRIER: Self = Self(1 << 6);

    const TYPE_MASK: u32 = 3;

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_module(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::MODULE.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EvalFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EvalFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_bits() {
        assert!(!EvalFlags::GLOBAL.is_module());
        assert!(EvalFlags::MODULE.is_module());
        assert!((EvalFlags::MODULE | EvalFlags::STRICT).is_module());
    }

    #[test]
    fn test_modifiers() {
        let mut flags = EvalFlags::GLOBAL;
        flags |= EvalFlags::STRICT | EvalFlags::BACKTRACE_BARRIER;
        assert!(flags.contains(EvalFlags::STRICT));
        assert!(!flags.contains(EvalFlags::STRIP));
        assert_eq!(flags.bits(), (1 << 3) | (1 << 6));
    }
}
