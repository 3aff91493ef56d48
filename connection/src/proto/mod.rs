//! Generated protobuf message types, compiled from the `.proto` files under `proto/` by
//! `build.rs`. Re-exported under names matching the upstream X Protocol package layout.

pub mod mysqlx {
    include!(concat!(env!("OUT_DIR"), "/mysqlx.rs"));

    pub mod datatypes {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.datatypes.rs"));
    }

    pub mod connection {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.connection.rs"));
    }

    pub mod session {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.session.rs"));
    }

    pub mod notice {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.notice.rs"));
    }

    pub mod sql {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.sql.rs"));
    }

    pub mod resultset {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.resultset.rs"));
    }

    pub mod prepare {
        include!(concat!(env!("OUT_DIR"), "/mysqlx.prepare.rs"));
    }
}
