use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, validate_unique, Validate};
use serde::{Deserialize, Serialize};

/// 依目標欄位名稱決定的型別轉換規則
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Integer,
    Decimal,
    Boolean,
    Text,
}

impl FieldKind {
    /// 子字串比對，順序即優先權 (例如 `fecha_resuelto` 是日期而非布林)
    pub fn classify(field: &str) -> Self {
        if field.contains("fecha") || field.contains("date") {
            FieldKind::Date
        } else if field.contains("ejercicio") || field.contains("duracion") || field == "cantidad" {
            FieldKind::Integer
        } else if field.contains("coste") || field.contains("gastos") {
            FieldKind::Decimal
        } else if field == "resuelto" {
            FieldKind::Boolean
        } else {
            FieldKind::Text
        }
    }
}

/// 來源欄位 → 目標欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub source: String,
    pub field: String,
}

impl ColumnSpec {
    pub fn new(source: &str, field: &str) -> Self {
        Self {
            source: source.to_string(),
            field: field.to_string(),
        }
    }
}

/// 判斷重複用的自然鍵 (1 或 2 個欄位)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(Vec<String>);

impl NaturalKey {
    pub fn single(field: &str) -> Self {
        Self(vec![field.to_string()])
    }

    pub fn pair(first: &str, second: &str) -> Self {
        Self(vec![first.to_string(), second.to_string()])
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// 一個匯入目標：資料表、必要欄位、欄位對照與自然鍵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTarget {
    pub name: String,
    pub table: String,
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub natural_key: Option<NaturalKey>,
    /// 清空此資料表前要先清空的資料表
    #[serde(default)]
    pub dependents: Vec<String>,
    pub columns: Vec<ColumnSpec>,
}

impl ImportTarget {
    /// ExpoWin「Incidencias Detalladas」匯出
    pub fn incidencias() -> Self {
        const COLUMNS: &[(&str, &str)] = &[
            ("Clase Incidencia", "clase_incidencia"),
            ("Numero", "numero"),
            ("Estado", "estado"),
            ("Tipo de Estado", "tipo_estado"),
            ("Fecha", "fecha"),
            ("Tienda", "tienda"),
            ("Nombre Tienda", "nombre_tienda"),
            ("Proveedor", "proveedor"),
            ("Nombre proveedor", "nombre_proveedor"),
            ("Marca", "marca"),
            ("Teléfono", "telefono"),
            ("Fax", "fax"),
            ("Duración Abierta", "duracion_abierta"),
            ("Cliente", "cliente"),
            ("Nombre Cliente", "nombre_cliente"),
            ("Teléfono Cliente", "telefono_cliente"),
            ("Camion", "camion"),
            ("Vendedor", "vendedor"),
            ("Nombre vendedor", "nombre_vendedor"),
            ("Ejercicio Pedido", "ejercicio_pedido"),
            ("Serie Pedido", "serie_pedido"),
            ("Pedido", "pedido"),
            ("Referencia Pedido", "referencia"),
            ("Ejercicio Albarán", "ejercicio_albaran"),
            ("Serie Albarán", "serie_albaran"),
            ("Albarán", "albaran"),
            ("Artículo", "articulo"),
            ("Descripción", "descripcion"),
            ("Descripción2", "descripcion2"),
            ("Referencia Artículo", "referencia_articulo"),
            ("Cantidad", "cantidad"),
            ("Tipo", "tipo"),
            ("Gravedad", "gravedad"),
            ("Última Recepción", "ultima_recepcion"),
            ("Resuelto", "resuelto"),
            ("Fecha Resuelto", "fecha_resuelto"),
            ("Solución", "solucion"),
            ("Fecha de Alta", "fecha_alta"),
            ("Gastos Asociados", "gastos_asociados"),
            ("Coste", "coste"),
        ];

        Self {
            name: "incidencias".to_string(),
            table: "incidencias".to_string(),
            required_columns: ["Clase Incidencia", "Numero", "Cliente", "Nombre Cliente"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            natural_key: Some(NaturalKey::pair("numero", "clase_incidencia")),
            dependents: Vec::new(),
            columns: COLUMNS
                .iter()
                .map(|(source, field)| ColumnSpec::new(source, field))
                .collect(),
        }
    }

    pub fn incidencias_recibidas() -> Self {
        const COLUMNS: &[(&str, &str)] = &[
            ("DOCUMENTO", "documento"),
            ("NUMERO", "numero"),
            ("FECHA", "fecha"),
            ("F_SERV_", "f_serv"),
            ("CLIENTE", "cliente"),
            ("C_POSTAL", "c_postal"),
            ("POBLACIÓN", "poblacion"),
            ("RUTA", "ruta"),
            ("FECHA_RECEPCION", "fecha_recepcion"),
            ("FECHA_INCIDENCIA", "fecha_incidencia"),
            ("TELEFONO1", "telefono1"),
            ("TELEFONO2", "telefono2"),
            ("INCIDENCIA", "incidencia"),
            ("CODIGO_INCIDENCIA", "codigo_incidencia"),
        ];

        Self {
            name: "incidencias_recibidas".to_string(),
            table: "incidencias_recibidas".to_string(),
            required_columns: ["DOCUMENTO", "NUMERO", "CLIENTE", "CODIGO_INCIDENCIA"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            natural_key: Some(NaturalKey::pair("numero", "codigo_incidencia")),
            dependents: vec!["comunicaciones".to_string()],
            columns: COLUMNS
                .iter()
                .map(|(source, field)| ColumnSpec::new(source, field))
                .collect(),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::incidencias(), Self::incidencias_recibidas()]
    }

    pub fn destination_fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.field.as_str())
    }
}

impl Validate for ImportTarget {
    fn validate(&self) -> Result<()> {
        let prefix = format!("targets.{}", self.name);
        validate_non_empty_string("targets.name", &self.name)?;
        validate_non_empty_string(&format!("{}.table", prefix), &self.table)?;

        if self.columns.is_empty() {
            return Err(ImportError::ConfigValidationError {
                field: format!("{}.columns", prefix),
                message: "At least one column mapping is required".to_string(),
            });
        }
        validate_unique(&format!("{}.columns", prefix), self.destination_fields())?;

        if let Some(key) = &self.natural_key {
            validate_range(
                &format!("{}.natural_key", prefix),
                key.fields().len(),
                1,
                2,
            )?;
            for field in key.fields() {
                if !self.destination_fields().any(|f| f == field) {
                    return Err(ImportError::InvalidConfigValueError {
                        field: format!("{}.natural_key", prefix),
                        value: field.clone(),
                        reason: "Natural key field is not a mapped destination field".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_field_kinds() {
        assert_eq!(FieldKind::classify("fecha_alta"), FieldKind::Date);
        assert_eq!(FieldKind::classify("fecha_resuelto"), FieldKind::Date);
        assert_eq!(FieldKind::classify("update_date"), FieldKind::Date);
        assert_eq!(FieldKind::classify("ejercicio_pedido"), FieldKind::Integer);
        assert_eq!(FieldKind::classify("duracion_abierta"), FieldKind::Integer);
        assert_eq!(FieldKind::classify("cantidad"), FieldKind::Integer);
        assert_eq!(FieldKind::classify("cantidad_total"), FieldKind::Text);
        assert_eq!(FieldKind::classify("coste"), FieldKind::Decimal);
        assert_eq!(FieldKind::classify("gastos_asociados"), FieldKind::Decimal);
        assert_eq!(FieldKind::classify("resuelto"), FieldKind::Boolean);
        assert_eq!(FieldKind::classify("numero"), FieldKind::Text);
    }

    #[test]
    fn test_builtin_targets_are_valid() {
        for target in ImportTarget::builtin() {
            target.validate().unwrap();
        }
        assert_eq!(ImportTarget::incidencias().columns.len(), 40);
        assert_eq!(ImportTarget::incidencias_recibidas().columns.len(), 14);
    }

    #[test]
    fn test_natural_key_must_be_mapped() {
        let mut target = ImportTarget::incidencias_recibidas();
        target.natural_key = Some(NaturalKey::pair("numero", "clase_incidencia"));
        assert!(target.validate().is_err());

        target.natural_key = Some(NaturalKey(vec![
            "numero".into(),
            "cliente".into(),
            "documento".into(),
        ]));
        assert!(target.validate().is_err());
    }

    #[test]
    fn test_duplicate_destination_field_rejected() {
        let mut target = ImportTarget::incidencias_recibidas();
        target.columns.push(ColumnSpec::new("OTRO", "numero"));
        assert!(target.validate().is_err());
    }
}
