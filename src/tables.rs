//! Fixed definitions of the auxiliary tables this crate provisions and appends to.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Column binding a dependent record to its parent lote.
pub const REFERENCE_COLUMN: &str = "OBJECTID_REF";
/// Primary key of every owned table.
pub const ID_COLUMN: &str = "ID";
/// Server-set creation timestamp.
pub const CREATED_AT_COLUMN: &str = "FECHA_CREACION";
/// Submitting user.
pub const USER_COLUMN: &str = "Usuario";
/// Primary key of the lotes table.
pub const LOTE_ID_COLUMN: &str = "OBJECTID";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Titular,
    Seguimiento,
    ServicioTecnico,
    MuestraRegistro,
}

/// A column that is not part of the shared skeleton (ID, reference, user, creation time).
#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    /// SQL type as declared in CREATE TABLE.
    pub sql_type: &'static str,
    pub kind: FieldKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Flag,
    DateTime,
    /// Text restricted to a fixed set of uppercase values.
    Enum(&'static [&'static str]),
}

pub const ESTADO_VALUES: &[&str] = &["ACTIVO", "SUSPENDIDO", "PROCESO"];
pub const ACCION_VALUES: &[&str] = &["MEDICION", "DESARROLLO", "ASIGNACION"];
pub const PREPARACION_TIERRA_VALUES: &[&str] = &["CORTE", "CRUCE", "RASTRA"];
pub const RIESGO_VALUES: &[&str] = &["SECANO", "GRAVEDAD", "ASPERSION", "GOTEO"];

const fn col(name: &'static str, sql_type: &'static str, kind: FieldKind) -> ColumnDef {
    ColumnDef { name, sql_type, kind }
}

const TITULAR_COLUMNS: &[ColumnDef] = &[
    col("CODIGO_LOTE", "TEXT(50)", FieldKind::Text),
    col("AC", "TEXT(50)", FieldKind::Text),
    col("TITULAR", "TEXT(255)", FieldKind::Text),
    col("CEDULA", "TEXT(20)", FieldKind::Text),
    col("FECHA_ASIGNACION", "DATETIME", FieldKind::DateTime),
];

const SEGUIMIENTO_COLUMNS: &[ColumnDef] = &[
    col("ESTADO", "TEXT(20)", FieldKind::Enum(ESTADO_VALUES)),
    col("ACCION", "TEXT(20)", FieldKind::Enum(ACCION_VALUES)),
    col("DEPARTAMENTO", "TEXT(100)", FieldKind::Text),
    col("GERENCIA", "TEXT(100)", FieldKind::Text),
];

const SERVICIO_TECNICO_COLUMNS: &[ColumnDef] = &[
    col("TECNICO_RESPONSABLE", "TEXT(255)", FieldKind::Text),
    col("CULTIVO", "TEXT(100)", FieldKind::Text),
    col("FECHA_SIEMBRA", "DATETIME", FieldKind::DateTime),
    col("PREPARACION_TIERRA", "TEXT(20)", FieldKind::Enum(PREPARACION_TIERRA_VALUES)),
    col("RIESGO", "TEXT(20)", FieldKind::Enum(RIESGO_VALUES)),
    col("CONTROL_PLAGAS", "BOOLEAN NOT NULL DEFAULT 0", FieldKind::Flag),
    col("FERTILIZACION", "BOOLEAN NOT NULL DEFAULT 0", FieldKind::Flag),
    col("COSECHA", "BOOLEAN NOT NULL DEFAULT 0", FieldKind::Flag),
];

const MUESTRA_REGISTRO_COLUMNS: &[ColumnDef] = &[
    col("TIPO_MUESTRA", "TEXT(50)", FieldKind::Text),
    col("PROFUNDIDAD", "REAL", FieldKind::Number),
    col("VALOR_MEDIDO", "REAL", FieldKind::Number),
    col("UNIDAD", "TEXT(20)", FieldKind::Text),
    col("VALIDADO", "BOOLEAN NOT NULL DEFAULT 0", FieldKind::Flag),
    col("COORD_X", "REAL", FieldKind::Number),
    col("COORD_Y", "REAL", FieldKind::Number),
    col("FECHA_MUESTRA", "DATETIME", FieldKind::DateTime),
];

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Titular,
        TableKind::Seguimiento,
        TableKind::ServicioTecnico,
        TableKind::MuestraRegistro,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::Titular => "titular",
            TableKind::Seguimiento => "seguimiento",
            TableKind::ServicioTecnico => "servicio_tecnico",
            TableKind::MuestraRegistro => "muestra_registro",
        }
    }

    /// Business columns, between the reference column and the user/creation columns.
    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            TableKind::Titular => TITULAR_COLUMNS,
            TableKind::Seguimiento => SEGUIMIENTO_COLUMNS,
            TableKind::ServicioTecnico => SERVICIO_TECNICO_COLUMNS,
            TableKind::MuestraRegistro => MUESTRA_REGISTRO_COLUMNS,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns().iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn index_name(&self) -> String {
        format!("idx_{}_{}", self.table_name(), REFERENCE_COLUMN.to_lowercase())
    }

    /// Value stored in `Usuario` when the caller does not name one.
    pub fn default_user(&self) -> &'static str {
        match self {
            TableKind::MuestraRegistro => "Sistema",
            _ => "api_user",
        }
    }

    /// Date columns that take the creation time when the caller leaves them out.
    pub fn defaults_to_now(&self) -> &'static [&'static str] {
        match self {
            TableKind::Titular => &["FECHA_ASIGNACION"],
            _ => &[],
        }
    }

    /// Columns copied from the parent lote when the caller leaves them out.
    pub fn inherited_from_lote(&self) -> &'static [&'static str] {
        match self {
            TableKind::Titular => &["CODIGO_LOTE"],
            _ => &[],
        }
    }

    /// Columns the server owns; callers can never set them.
    pub fn is_server_column(name: &str) -> bool {
        [ID_COLUMN, REFERENCE_COLUMN, CREATED_AT_COLUMN]
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for TableKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableKind::ALL
            .iter()
            .copied()
            .find(|k| k.table_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::Config(format!("unknown table kind '{}'", s)))
    }
}
