pub mod blocks;
pub mod builder;
pub(crate) mod cfa;
pub mod description;
pub(crate) mod error;
pub(crate) mod expr;
pub mod loops;

pub use blocks::{Block, BlockId, BlockPartitioning};
pub use builder::CfaBuilder;
pub use cfa::*;
pub use error::CfaError;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use loops::{Loop, LoopStructure};

use internment::Intern;

/// Interned name of a variable or function.
pub type Identifier = Intern<String>;

/// Intern a name.
pub fn ident<S: AsRef<str>>(name: S) -> Identifier {
    Intern::new(name.as_ref().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{CfaBuilder, Expr, ident};

    /// `i = 0; while (i < 10) { i = i + 1; if (i == 3) error; }`
    pub(crate) fn counting_loop() -> crate::Cfa {
        let mut b = CfaBuilder::new();
        let main = b.add_function("main").unwrap();
        let head = b.add_node("main").unwrap();
        let body = b.add_node("main").unwrap();
        let check = b.add_node("main").unwrap();
        let error = b.add_node("main").unwrap();
        b.mark_error(error).unwrap();
        b.assign(main.entry, head, "i", Expr::constant(0)).unwrap();
        let i = Expr::var("i");
        b.assume(head, body, i.clone().less_than(Expr::constant(10)), true)
            .unwrap();
        b.assume(head, main.exit, i.clone().less_than(Expr::constant(10)), false)
            .unwrap();
        b.assign(body, check, "i", i.clone().plus(Expr::constant(1)))
            .unwrap();
        b.assume(check, error, i.clone().equals(Expr::constant(3)), true)
            .unwrap();
        b.assume(check, head, i.equals(Expr::constant(3)), false)
            .unwrap();
        b.build("main").unwrap()
    }

    #[test]
    fn interned_names_compare_by_value() {
        assert_eq!(ident("x"), ident(String::from("x")));
        assert_ne!(ident("x"), ident("y"));
    }
}
